use anyhow::Result;
use std::sync::{Arc, LazyLock};

use crate::models::AuthOutcome;
use crate::services::Database;

#[cfg(not(test))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const BCRYPT_COST: u32 = 4;

/// Verified against when the username is unknown, so both failures cost one bcrypt run
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    bcrypt::hash("dummy-password-for-unknown-users", BCRYPT_COST).unwrap_or_default()
});

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Account creation and login against the users table
pub struct AuthService {
    db: Arc<Database>,
}

impl AuthService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<AuthOutcome> {
        let username = username.trim();
        let email = email.trim();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Ok(rejected("All fields are required"));
        }
        if username.chars().count() < 3 {
            return Ok(rejected("Username must be at least 3 characters"));
        }
        if password.chars().count() < 6 {
            return Ok(rejected("Password must be at least 6 characters"));
        }
        if !email.contains('@') {
            return Ok(rejected("Please provide a valid email"));
        }

        let username = username.to_lowercase();
        let email = email.to_lowercase();
        let password_hash = hash_password_blocking(password.to_string()).await?;

        match self.db.insert_user(&username, &email, &password_hash).await? {
            Some(user_id) => {
                log::info!("👤 New user registered: {} (id {})", username, user_id);
                Ok(AuthOutcome::Success { user_id, username })
            }
            None => {
                log::info!("⚠️ Signup collision for {} / {}", username, email);
                Ok(rejected("Username or email already exists"))
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthOutcome> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Ok(rejected("Please provide both username and password"));
        }

        let credentials = self.db.find_credentials(&username.to_lowercase()).await?;

        let stored = credentials.as_ref().map(|c| c.password_hash.clone());
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || {
            verify_password(&password, stored.as_deref().unwrap_or(DUMMY_HASH.as_str()))
        })
        .await?;

        let Some(credentials) = credentials else {
            log::info!("🔒 Login failed, unknown user: {}", username);
            return Ok(rejected(INVALID_CREDENTIALS));
        };
        if !verified {
            log::info!("🔒 Login failed, wrong password: {}", credentials.username);
            return Ok(rejected(INVALID_CREDENTIALS));
        }

        self.db.touch_last_login(credentials.id).await?;
        log::info!("✅ User logged in: {} (id {})", credentials.username, credentials.id);

        Ok(AuthOutcome::Success {
            user_id: credentials.id,
            username: credentials.username,
        })
    }
}

fn rejected(message: &str) -> AuthOutcome {
    AuthOutcome::Rejected(message.to_string())
}

async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// bcrypt hash with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

/// Malformed stored hashes never verify
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
