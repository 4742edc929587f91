use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;

use super::{DoctorDirectory, RepoResult, UserRepository, join_history};
use crate::error::RepositoryError;
use crate::models::{Doctor, NewUser, User};

/// Process-local users and doctors, used when no `DATABASE_URL` is configured and in tests
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<DashMap<String, User>>,
    doctors: Arc<DashMap<String, Doctor>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        let repository = Self::new();
        for doctor in doctors {
            repository.doctors.insert(doctor.username.clone(), doctor);
        }
        repository
    }

    fn update<F>(&self, username: &str, apply: F)
    where
        F: FnOnce(&mut User),
    {
        if let Some(mut user) = self.users.get_mut(username) {
            apply(&mut user);
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<()> {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Duplicate(user.username)),
            Entry::Vacant(slot) => {
                slot.insert(User::from(user));
                Ok(())
            }
        }
    }

    async fn find_user(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self.users.get(username).map(|entry| entry.clone()))
    }

    async fn set_disorder(&self, username: &str, disorder: &str) -> RepoResult<()> {
        self.update(username, |user| user.disorder = disorder.to_string());
        Ok(())
    }

    async fn set_severity(&self, username: &str, severity: &str) -> RepoResult<()> {
        self.update(username, |user| user.severity = severity.to_string());
        Ok(())
    }

    async fn set_counseling_date(&self, username: &str, date: &str) -> RepoResult<()> {
        self.update(username, |user| user.date = date.to_string());
        Ok(())
    }

    async fn append_history(&self, username: &str, entry: &str) -> RepoResult<()> {
        self.update(username, |user| user.history = join_history(&user.history, entry));
        Ok(())
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryRepository {
    async fn list_doctors(&self) -> RepoResult<Vec<Doctor>> {
        let mut doctors: Vec<Doctor> = self.doctors.iter().map(|e| e.value().clone()).collect();
        doctors.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(doctors)
    }

    async fn find_doctor(&self, username: &str) -> RepoResult<Option<Doctor>> {
        Ok(self.doctors.get(username).map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NEVER_COUNSELED, NOT_DIAGNOSED};

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            email: "NA".to_string(),
        }
    }

    #[tokio::test]
    async fn new_users_start_undiagnosed() {
        let repo = InMemoryRepository::new();
        repo.create_user(new_user("ada")).await.unwrap();

        let user = repo.find_user("ada").await.unwrap().unwrap();
        assert_eq!(user.disorder, NOT_DIAGNOSED);
        assert_eq!(user.severity, NOT_DIAGNOSED);
        assert_eq!(user.date, NEVER_COUNSELED);
        assert!(!user.diagnosed());
        assert!(!user.counseled());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let repo = InMemoryRepository::new();
        repo.create_user(new_user("ada")).await.unwrap();

        let err = repo.create_user(new_user("ada")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(name) if name == "ada"));
    }

    #[tokio::test]
    async fn history_entries_are_pipe_joined() {
        let repo = InMemoryRepository::new();
        repo.create_user(new_user("ada")).await.unwrap();

        repo.append_history("ada", "User: hi | AI: hello").await.unwrap();
        repo.append_history("ada", "User: bye | AI: take care").await.unwrap();

        let user = repo.find_user("ada").await.unwrap().unwrap();
        assert_eq!(
            user.history,
            "User: hi | AI: hello | User: bye | AI: take care"
        );
    }

    #[tokio::test]
    async fn updates_for_unknown_users_are_ignored() {
        let repo = InMemoryRepository::new();
        repo.set_severity("guest", "Mild").await.unwrap();
        assert!(repo.find_user("guest").await.unwrap().is_none());
    }
}
