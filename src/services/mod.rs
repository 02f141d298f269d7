pub mod auth;
pub mod database;
pub mod health_api; // USDA, ExerciseDB and quotes
pub mod health_tools;

pub use auth::AuthService;
pub use database::Database;
pub use health_api::{ApiService, HealthDataService};
