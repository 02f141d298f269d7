use std::env;
use std::path::PathBuf;

pub const DEFAULT_SECRET_KEY: &str = "dev-secret-key-change-in-production";

/// Session cookies live for 7 days
pub const SESSION_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

pub const INTENTS_FILE: &str = "intents.json";
pub const DISEASES_FILE: &str = "diseases.json";
pub const MENTAL_HEALTH_FILE: &str = "mental_health_qa.json";
pub const FITNESS_FILE: &str = "fitness_qa.json";
pub const NUTRITION_FILE: &str = "nutrition_tips.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub app_env: String,
    pub bind_addr: String,
    pub usda_api_key: Option<String>,
    pub rapid_api_key: Option<String>,
    pub database_path: PathBuf,
    pub data_dir: PathBuf,
    pub usda_api_url: String,
    pub exercise_api_url: String,
    pub quotes_api_url: String,
    /// Minimum similarity score for general intent matching
    pub fuzzy_match_threshold: f64,
    /// Maximum messages stored per user
    pub max_chat_history: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            app_env: "development".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            usda_api_key: None,
            rapid_api_key: None,
            database_path: PathBuf::from("data/chatbot.db"),
            data_dir: PathBuf::from("data"),
            usda_api_url: "https://api.nal.usda.gov/fdc/v1/foods/search".to_string(),
            exercise_api_url: "https://exercisedb.p.rapidapi.com/exercises".to_string(),
            quotes_api_url: "https://type.fit/api/quotes".to_string(),
            fuzzy_match_threshold: 0.6,
            max_chat_history: 100,
        }
    }
}

impl Config {
    /// Build configuration from environment variables (call `dotenv()` first)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            log::warn!("⚠️ SECRET_KEY not set, using the development key (INSECURE!)");
            defaults.secret_key.clone()
        });

        Self {
            secret_key,
            app_env: env::var("APP_ENV").unwrap_or(defaults.app_env),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            usda_api_key: non_empty_var("USDA_API_KEY"),
            rapid_api_key: non_empty_var("RAPID_API_KEY"),
            database_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            usda_api_url: env::var("USDA_API_URL").unwrap_or(defaults.usda_api_url),
            exercise_api_url: env::var("EXERCISE_API_URL").unwrap_or(defaults.exercise_api_url),
            quotes_api_url: env::var("QUOTES_API_URL").unwrap_or(defaults.quotes_api_url),
            fuzzy_match_threshold: parsed_var("FUZZY_MATCH_THRESHOLD")
                .unwrap_or(defaults.fuzzy_match_threshold),
            max_chat_history: parsed_var("MAX_CHAT_HISTORY").unwrap_or(defaults.max_chat_history),
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// Names of API keys that are not configured
    pub fn missing_api_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.usda_api_key.is_none() {
            missing.push("USDA_API_KEY");
        }
        if self.rapid_api_key.is_none() {
            missing.push("RAPID_API_KEY");
        }
        missing
    }

    /// Knowledge base files that are absent from the data directory
    pub fn missing_data_files(&self) -> Vec<&'static str> {
        [
            INTENTS_FILE,
            DISEASES_FILE,
            MENTAL_HEALTH_FILE,
            FITNESS_FILE,
            NUTRITION_FILE,
        ]
        .into_iter()
        .filter(|name| !self.data_dir.join(name).exists())
        .collect()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("⚠️ Ignoring invalid value for {}: '{}'", name, raw);
            None
        }
    }
}
