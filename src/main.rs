mod config;
mod handlers;
mod matching;
mod models;
mod services;
mod web;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::{ChatbotEngine, MessageHandler};
use services::{ApiService, AuthService, Database, HealthDataService};
use web::{create_router, AppState, SessionSigner};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🩺 Starting Health & Fitness Chatbot...");

    let config = Config::from_env();

    let missing_keys = config.missing_api_keys();
    if missing_keys.is_empty() {
        log::info!("✅ All API keys configured");
    } else {
        log::warn!(
            "⚠️ Missing API keys: {} (related features will be limited)",
            missing_keys.join(", ")
        );
    }

    let missing_files = config.missing_data_files();
    if !missing_files.is_empty() {
        log::warn!(
            "⚠️ Missing data files in {}: {}",
            config.data_dir.display(),
            missing_files.join(", ")
        );
    }

    // Initialize SQLite database
    let db = Arc::new(Database::new(&config.database_path, config.max_chat_history).await?);
    log::info!("✅ SQLite database initialized at {}", config.database_path.display());

    let engine = Arc::new(ChatbotEngine::load(&config.data_dir, config.fuzzy_match_threshold));
    let health_api = Arc::new(ApiService::new(&config)) as Arc<dyn HealthDataService>;

    let message_handler = MessageHandler::new(db.clone(), engine, health_api);
    log::info!("✅ Message handler initialized");

    let state = Arc::new(AppState {
        db: db.clone(),
        auth: AuthService::new(db.clone()),
        message_handler,
        sessions: SessionSigner::new(&config.secret_key, config.is_production()),
    });

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("🌐 Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("🛑 Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
    }
}
