use sqlx::FromRow;
use time::OffsetDateTime;

/// Row of the `users` table. Never serialized: the hash stays server side.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}
