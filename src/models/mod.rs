use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Stored login data, never serialized to clients
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    pub is_user_message: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub total_messages: i64,
    pub user_messages: i64,
    pub first_message: Option<DateTime<Utc>>,
    pub last_message: Option<DateTime<Utc>>,
}

/// Outcome of a signup or login attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Success { user_id: i64, username: String },
    Rejected(String),
}

// Request bodies. Fields default to empty so a partial body gets a
// validation message instead of a rejection.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
}

/// Body of `/api/health-tool`; numbers may come as JSON numbers or strings
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HealthToolRequest {
    pub tool: Option<String>,
    pub weight: Option<serde_json::Value>,
    pub height: Option<serde_json::Value>,
    pub age: Option<serde_json::Value>,
    pub gender: Option<String>,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BmiResult {
    pub bmi: f64,
    pub category: String,
    pub advice: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaterIntakeResult {
    pub water_liters: f64,
    pub water_glasses: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalorieResult {
    pub maintenance_calories: i64,
    pub weight_loss_calories: i64,
    pub weight_gain_calories: i64,
    pub bmr: i64,
    pub message: String,
}
