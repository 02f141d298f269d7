use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use axum_extra::extract::cookie::SignedCookieJar;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{AppError, AppState, CurrentUser};
use crate::models::{AuthOutcome, ChatRequest, HealthToolRequest, LoginRequest, SignupRequest};
use crate::services::health_tools;

const HISTORY_LIMIT: i64 = 50;
const AFTER_LOGIN: &str = "/chat";

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.auth.login(&request.username, &request.password).await?;
    start_session(&state, &headers, outcome, "Login successful! 🎉")
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .auth
        .signup(&request.username, &request.email, &request.password)
        .await?;
    start_session(&state, &headers, outcome, "Account created successfully! 🎉")
}

/// Set the session cookie on success, otherwise pass the rejection through
fn start_session(
    state: &AppState,
    headers: &HeaderMap,
    outcome: AuthOutcome,
    success_message: &str,
) -> Result<(SignedCookieJar, Json<Value>), AppError> {
    let jar = state.sessions.jar(headers);
    match outcome {
        AuthOutcome::Success { user_id, username } => {
            let cookie = state.sessions.login_cookie(user_id, &username)?;
            Ok((
                jar.add(cookie),
                Json(json!({
                    "success": true,
                    "message": success_message,
                    "redirect": AFTER_LOGIN,
                })),
            ))
        }
        AuthOutcome::Rejected(message) => Ok((
            jar,
            Json(json!({
                "success": false,
                "message": message,
            })),
        )),
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, AppError> {
    let reply = state
        .message_handler
        .handle_chat(user.user_id, &request.message)
        .await?;
    Ok(Json(json!({ "reply": reply })))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let history = state.db.get_chat_history(user.user_id, HISTORY_LIMIT).await?;
    Ok(Json(json!({ "history": history })))
}

pub async fn clear_history(State(state): State<Arc<AppState>>, user: CurrentUser) -> Json<Value> {
    match state.db.clear_chat_history(user.user_id).await {
        Ok(deleted) => {
            log::info!("🗑️ Cleared {} messages for user {}", deleted, user.user_id);
            Json(json!({ "success": true, "message": "Chat history cleared! 🗑️" }))
        }
        Err(e) => {
            log::error!("❌ Failed to clear history for {}: {}", user.user_id, e);
            Json(json!({ "success": false, "message": "Failed to clear history" }))
        }
    }
}

pub async fn health_tool(_user: CurrentUser, Json(request): Json<HealthToolRequest>) -> Json<Value> {
    Json(health_tools::run_tool(&request))
}

pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let stats = state.db.get_user_stats(user.user_id).await?;
    let user_info = state.db.get_user_by_id(user.user_id).await?;
    Ok(Json(json!({ "user": user_info, "stats": stats })))
}
