use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use super::{DoctorDirectory, RepoResult, UserRepository};
use crate::error::RepositoryError;
use crate::models::{Doctor, NewUser, User};

/// `users` / `doctors` tables in Postgres
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(database_url: &str) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let repository = Self { pool };
        repository.migrate().await?;
        Ok(repository)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn migrate(&self) -> RepoResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                date TEXT NOT NULL DEFAULT 'date',
                firstname TEXT NOT NULL,
                lastname TEXT NOT NULL,
                email TEXT NOT NULL DEFAULT 'NA',
                disorder TEXT NOT NULL DEFAULT 'Not-Diagnosed',
                severity TEXT NOT NULL DEFAULT 'Not-Diagnosed',
                history TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS doctors (
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                firstname TEXT NOT NULL,
                lastname TEXT NOT NULL,
                fees TEXT NOT NULL,
                qualification TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("users and doctors tables ready");
        Ok(())
    }

    async fn update_column(&self, sql: &str, username: &str, value: &str) -> RepoResult<()> {
        sqlx::query(sql)
            .bind(value)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (username, password, firstname, lastname, email)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(RepositoryError::Duplicate(user.username));
        }
        Ok(())
    }

    async fn find_user(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT username, password, date, firstname, lastname, email, disorder, severity, history \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_disorder(&self, username: &str, disorder: &str) -> RepoResult<()> {
        self.update_column("UPDATE users SET disorder = $1 WHERE username = $2", username, disorder)
            .await
    }

    async fn set_severity(&self, username: &str, severity: &str) -> RepoResult<()> {
        self.update_column("UPDATE users SET severity = $1 WHERE username = $2", username, severity)
            .await
    }

    async fn set_counseling_date(&self, username: &str, date: &str) -> RepoResult<()> {
        self.update_column("UPDATE users SET date = $1 WHERE username = $2", username, date)
            .await
    }

    async fn append_history(&self, username: &str, entry: &str) -> RepoResult<()> {
        // single statement so concurrent turns cannot drop each other's entries
        self.update_column(
            "UPDATE users SET history = CASE WHEN history = '' THEN $1 ELSE history || ' | ' || $1 END \
             WHERE username = $2",
            username,
            entry,
        )
        .await
    }
}

#[async_trait]
impl DoctorDirectory for PgRepository {
    async fn list_doctors(&self) -> RepoResult<Vec<Doctor>> {
        let doctors = sqlx::query_as::<_, Doctor>(
            "SELECT username, password, firstname, lastname, fees, qualification \
             FROM doctors ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(doctors)
    }

    async fn find_doctor(&self, username: &str) -> RepoResult<Option<Doctor>> {
        let doctor = sqlx::query_as::<_, Doctor>(
            "SELECT username, password, firstname, lastname, fees, qualification \
             FROM doctors WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doctor)
    }
}
