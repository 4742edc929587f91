use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const NOT_DIAGNOSED: &str = "Not-Diagnosed";
/// Placeholder stored in `users.date` until the first counseling visit
pub const NEVER_COUNSELED: &str = "date";
pub const NO_EMAIL: &str = "NA";
pub const GUEST_USER: &str = "guest";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub date: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub disorder: String,
    pub severity: String,
    pub history: String,
}

impl User {
    pub fn diagnosed(&self) -> bool {
        self.disorder != NOT_DIAGNOSED
    }

    pub fn counseled(&self) -> bool {
        self.date != NEVER_COUNSELED
    }
}

/// Fields captured at signup; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

impl From<NewUser> for User {
    fn from(new: NewUser) -> Self {
        Self {
            username: new.username,
            password: new.password_hash,
            date: NEVER_COUNSELED.to_string(),
            firstname: new.firstname,
            lastname: new.lastname,
            email: new.email,
            disorder: NOT_DIAGNOSED.to_string(),
            severity: NOT_DIAGNOSED.to_string(),
            history: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Doctor {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub fees: String,
    pub qualification: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub username: String,
    pub redirect: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_input: String,
}

#[derive(Debug, Deserialize)]
pub struct LegacyChatQuery {
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisResponse {
    pub message: String,
    pub disorder: Option<String>,
    pub severity: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CounselingResponse {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub username: String,
    pub date: String,
    pub diagnosed: bool,
    pub disorder: String,
    pub severity: String,
    pub counseled: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: String,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub username: String,
    pub message: String,
}
