//! Persistence for the `users` and `doctors` tables.
//!
//! Updates against a username that has no row (the `guest` caller) are silent no-ops.

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::models::{Doctor, NewUser, User};

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; `RepositoryError::Duplicate` when the username is taken
    async fn create_user(&self, user: NewUser) -> RepoResult<()>;

    async fn find_user(&self, username: &str) -> RepoResult<Option<User>>;

    async fn set_disorder(&self, username: &str, disorder: &str) -> RepoResult<()>;

    async fn set_severity(&self, username: &str, severity: &str) -> RepoResult<()>;

    async fn set_counseling_date(&self, username: &str, date: &str) -> RepoResult<()>;

    /// Append one exchange to the history blob, `" | "`-separated from what is already there
    async fn append_history(&self, username: &str, entry: &str) -> RepoResult<()>;
}

/// Read-only doctor profiles
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn list_doctors(&self) -> RepoResult<Vec<Doctor>>;

    async fn find_doctor(&self, username: &str) -> RepoResult<Option<Doctor>>;
}

pub(crate) fn join_history(current: &str, entry: &str) -> String {
    if current.is_empty() {
        entry.to_string()
    } else {
        format!("{current} | {entry}")
    }
}
