use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::User;
use crate::error::{AppError, AppResult};

pub const DUPLICATE_USER: &str = "User with this email or username already exists";

/// Persistence for `users`. Uniqueness of email and username is enforced by
/// the store itself.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// True when any user already holds this email or this username.
    async fn exists(&self, email: &str, username: &str) -> AppResult<bool>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `Conflict` when a unique constraint trips.
    async fn create(&self, username: &str, email: &str, password_hash: &str) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn exists(&self, email: &str, username: &str) -> AppResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as(r#"SELECT id FROM users WHERE email = $1 OR username = $2 LIMIT 1"#)
                .bind(email)
                .bind(username)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.is_some())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, username: &str, email: &str, password_hash: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(DUPLICATE_USER.into())
            }
            other => other.into(),
        })
    }
}
