pub mod auth;
pub mod config;
pub mod counseling;
pub mod diagnosis;
pub mod error;
pub mod ml;
pub mod models;
pub mod repository;
pub mod service;
pub mod session_keys;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use service::{AppState, Dependencies, build_router};
