use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mindaid_flow::FlowError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures from the users/doctors tables
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("username already exists: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything a handler can fail with.
///
/// Upstream failures (database, classifier, LLM, workflow engine) are logged in full and reach
/// the client only as a generic message.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not authenticated")]
    Unauthorized,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("workflow error: {0}")]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            ),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Repository(RepositoryError::Duplicate(_)) => (
                StatusCode::CONFLICT,
                "Username already exists. Please choose a different username.".to_string(),
            ),
            AppError::Flow(_)
            | AppError::Repository(_)
            | AppError::PasswordHash(_)
            | AppError::Config(_) => {
                error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "I'm sorry, I'm having trouble responding right now. Please try again later."
                        .to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
