//! Signed-cookie sessions and password hashing.
//!
//! The `session` cookie carries `{created_at}|{username}`, signed with the process key. Signing
//! makes the value tamper-evident; `created_at` bounds its lifetime on the server side as well as
//! through `Max-Age`.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use chrono::{DateTime, Duration, Utc};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::config::MIN_SECRET_LEN;
use crate::error::{AppError, AppResult};
use crate::models::GUEST_USER;
use crate::service::AppState;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_TTL_HOURS: i64 = 1;

/// What the session cookie asserts about its bearer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl SessionClaims {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            created_at: Utc::now(),
        }
    }

    fn encode(&self) -> String {
        format!("{}|{}", self.created_at.timestamp(), self.username)
    }

    fn decode(value: &str) -> Option<Self> {
        let (timestamp, username) = value.split_once('|')?;
        let created_at = DateTime::from_timestamp(timestamp.parse().ok()?, 0)?;
        if username.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            created_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::hours(SESSION_TTL_HOURS)
    }
}

/// Cookie-signing key from `SECRET_KEY`, or a random one (sessions then die with the process)
pub fn cookie_key(secret: Option<&str>) -> Key {
    match secret {
        Some(secret) if secret.len() >= MIN_SECRET_LEN => match Key::try_from(secret.as_bytes()) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "SECRET_KEY unusable, generating a random cookie key");
                Key::generate()
            }
        },
        _ => Key::generate(),
    }
}

/// Add a fresh session cookie for `username`
pub fn issue_session(jar: SignedCookieJar, username: &str) -> SignedCookieJar {
    let claims = SessionClaims::new(username);
    let cookie = Cookie::build((SESSION_COOKIE, claims.encode()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::hours(SESSION_TTL_HOURS));
    jar.add(cookie)
}

pub fn clear_session(jar: SignedCookieJar) -> SignedCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Username from a valid, unexpired session cookie
pub fn current_user(headers: &HeaderMap, key: &Key) -> Option<String> {
    let jar = SignedCookieJar::from_headers(headers, key.clone());
    let claims = SessionClaims::decode(jar.get(SESSION_COOKIE)?.value())?;
    if claims.is_expired(Utc::now()) {
        debug!(username = %claims.username, "Session cookie expired");
        return None;
    }
    Some(claims.username)
}

/// Usernames end up inside the cookie value, so they stay within a cookie-safe alphabet
pub fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 64
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'))
}

pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::PasswordHash(e.to_string()))?
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::PasswordHash(e.to_string()))?
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// A signed-in user; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        current_user(&parts.headers, &state.cookie_key)
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// The signed-in user, or `guest` for anonymous chat callers
#[derive(Debug, Clone)]
pub struct ChatUser(pub String);

impl FromRequestParts<AppState> for ChatUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(ChatUser(
            current_user(&parts.headers, &state.cookie_key).unwrap_or_else(|| GUEST_USER.to_string()),
        ))
    }
}
