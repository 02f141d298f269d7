use anyhow::Result;
use std::sync::Arc;

use crate::handlers::ChatbotEngine;
use crate::services::{health_tools, Database, HealthDataService};

const EMPTY_MESSAGE_REPLY: &str = "Please say something! 😊";

const NUTRITION_PHRASES: &[&str] = &["calories in", "nutrition of", "nutrition in", "nutritional value of"];
const EXERCISE_PHRASES: &[&str] = &["exercises for", "workout for", "show me exercises", "exercise suggestions"];
const QUOTE_PHRASES: &[&str] = &["quote", "inspire me", "motivation"];
const WELLNESS_PHRASES: &[&str] = &["wellness tip", "health tip", "daily tip"];
const BMI_PHRASES: &[&str] = &["bmi", "body mass index"];
const WATER_PHRASES: &[&str] = &["water intake", "how much water", "daily water"];
const CALORIE_PHRASES: &[&str] = &["calculate calories", "daily calories", "calorie needs"];

const EXERCISE_LIMIT: usize = 5;

const BMI_PROMPT: &str = "To calculate your BMI, please tell me:\n\n'My weight is [X] kg and height is [Y] cm'\n\nFor example: 'My weight is 70 kg and height is 175 cm'";
const WATER_PROMPT: &str = "To calculate your daily water needs, please tell me:\n\n'I weigh [X] kg'\n\nFor example: 'I weigh 70 kg'";
const CALORIE_PROMPT: &str = "To calculate your daily calorie needs, I'll need:\n\n• Age\n• Weight (kg)\n• Height (cm)\n• Gender (male/female)\n• Activity level\n\nPlease use the calorie calculator button or visit the help page for a detailed form! 📊";

pub struct MessageHandler {
    db: Arc<Database>,
    engine: Arc<ChatbotEngine>,
    health_api: Arc<dyn HealthDataService>,
}

impl MessageHandler {
    pub fn new(
        db: Arc<Database>,
        engine: Arc<ChatbotEngine>,
        health_api: Arc<dyn HealthDataService>,
    ) -> Self {
        Self {
            db,
            engine,
            health_api,
        }
    }

    /// Answer a chat message and record both sides of the exchange.
    /// Empty messages are answered but not stored.
    pub async fn handle_chat(&self, user_id: i64, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(EMPTY_MESSAGE_REPLY.to_string());
        }

        log::info!("📨 INCOMING MESSAGE - User: {} | Content: '{}'", user_id, message);

        if let Err(e) = self.db.save_message(user_id, message, true).await {
            log::error!("❌ Failed to save user message for {}: {}", user_id, e);
        }

        let reply = self.process_message(message).await;

        if let Err(e) = self.db.save_message(user_id, &reply, false).await {
            log::error!("❌ Failed to save bot reply for {}: {}", user_id, e);
        }

        log::info!("📤 REPLY - User: {} | {} chars", user_id, reply.chars().count());
        Ok(reply)
    }

    /// Route a message to the first tool that claims it, falling back to
    /// the knowledge-base engine
    pub async fn process_message(&self, message: &str) -> String {
        let lower = message.to_lowercase();

        // Nutrition lookup
        for phrase in NUTRITION_PHRASES {
            if lower.contains(phrase) {
                let food = lower.replace(phrase, "");
                let food = food.trim();
                if !food.is_empty() {
                    return self.health_api.get_nutrition_info(food).await;
                }
            }
        }

        // Exercise suggestions
        for phrase in EXERCISE_PHRASES {
            if lower.contains(phrase) {
                let body_part = strip_word(&lower.replace(phrase, ""), "my");
                if !body_part.is_empty() {
                    return self.health_api.get_exercises(&body_part, EXERCISE_LIMIT).await;
                }
            }
        }

        if contains_any(&lower, QUOTE_PHRASES) {
            return self.health_api.get_motivational_quote().await;
        }

        if contains_any(&lower, WELLNESS_PHRASES) {
            return self.health_api.get_wellness_tip();
        }

        if contains_any(&lower, BMI_PHRASES) {
            return match health_tools::parse_bmi_input(message) {
                Some((weight, height)) => match health_tools::calculate_bmi(weight, height) {
                    Ok(result) => result.message,
                    Err(e) => e.to_string(),
                },
                None => BMI_PROMPT.to_string(),
            };
        }

        if contains_any(&lower, WATER_PHRASES) {
            return match health_tools::parse_water_input(message) {
                Some(weight) => match health_tools::calculate_water_intake(weight, "moderate") {
                    Ok(result) => result.message,
                    Err(e) => e.to_string(),
                },
                None => WATER_PROMPT.to_string(),
            };
        }

        if contains_any(&lower, CALORIE_PHRASES) {
            return CALORIE_PROMPT.to_string();
        }

        self.engine.get_response(message)
    }
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase))
}

/// Drop every standalone occurrence of `word` and normalise spacing
fn strip_word(text: &str, word: &str) -> String {
    text.split_whitespace()
        .filter(|w| *w != word)
        .collect::<Vec<_>>()
        .join(" ")
}
