use anyhow::Result;
use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap, response::Redirect};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::sync::Arc;

use super::AppState;
use crate::config::SESSION_LIFETIME_SECS;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: i64,
    pub username: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Session cookie holding `base64url(json)`, signed through `SignedCookieJar`
pub struct SessionSigner {
    key: Key,
    secure: bool,
}

impl SessionSigner {
    pub fn new(secret: &str, secure: bool) -> Self {
        // Key::from needs 64 bytes of key material
        let key = Key::from(Sha512::digest(secret.as_bytes()).as_slice());
        Self { key, secure }
    }

    /// Cookie jar for the request, verifying signatures with this key
    pub fn jar(&self, headers: &HeaderMap) -> SignedCookieJar {
        SignedCookieJar::from_headers(headers, self.key.clone())
    }

    fn encode(data: &SessionData) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(data)?))
    }

    /// `None` for malformed or expired payloads
    fn decode(value: &str) -> Option<SessionData> {
        let data: SessionData = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(value).ok()?).ok()?;
        if data.expires_at <= Utc::now().timestamp() {
            log::debug!("⌛ Session for {} expired", data.username);
            return None;
        }
        Some(data)
    }

    /// Session carried by the request, if its signature checks out
    pub fn read(&self, jar: &SignedCookieJar) -> Option<SessionData> {
        jar.get(SESSION_COOKIE).and_then(|cookie| Self::decode(cookie.value()))
    }

    pub fn login_cookie(&self, user_id: i64, username: &str) -> Result<Cookie<'static>> {
        let data = SessionData {
            user_id,
            username: username.to_string(),
            expires_at: Utc::now().timestamp() + SESSION_LIFETIME_SECS,
        };

        Ok(Cookie::build((SESSION_COOKIE, Self::encode(&data)?))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(SESSION_LIFETIME_SECS))
            .build())
    }

    pub fn logout_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, "")).path("/").build()
    }
}

/// Logged-in user; requests without a valid session are sent to `/login`
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let jar = state.sessions.jar(&parts.headers);
        match state.sessions.read(&jar) {
            Some(session) => Ok(CurrentUser {
                user_id: session.user_id,
                username: session.username,
            }),
            None => {
                log::debug!("🔒 No valid session for {}", parts.uri.path());
                Err(Redirect::to("/login"))
            }
        }
    }
}
