use async_trait::async_trait;
use sqlx::PgPool;

use super::{
    dto::BookInput,
    repo_types::{Book, BookWithOwner},
};
use crate::error::AppResult;

/// Persistence for `books`. Each method is a single statement; the store
/// owns row locking and `updated_at`.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn create(&self, owner_id: i32, book: &BookInput) -> AppResult<Book>;

    /// Every book with its owner's username, newest first.
    async fn list_all(&self) -> AppResult<Vec<BookWithOwner>>;

    /// Books of one owner, newest first.
    async fn list_by_owner(&self, owner_id: i32) -> AppResult<Vec<Book>>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    async fn owner_of(&self, id: i32) -> AppResult<Option<i32>>;

    /// `None` when the row no longer exists.
    async fn update(&self, id: i32, book: &BookInput) -> AppResult<Option<Book>>;

    /// Returns the deleted row, `None` when it did not exist.
    async fn delete(&self, id: i32) -> AppResult<Option<Book>>;
}

#[derive(Clone)]
pub struct PgBookStore {
    db: PgPool,
}

impl PgBookStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn create(&self, owner_id: i32, book: &BookInput) -> AppResult<Book> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, year, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, author, year, user_id, created_at, updated_at
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_all(&self) -> AppResult<Vec<BookWithOwner>> {
        let rows = sqlx::query_as::<_, BookWithOwner>(
            r#"
            SELECT b.id, b.title, b.author, b.year, b.created_at, b.updated_at,
                   u.id AS owner_id, u.username AS owner_username
              FROM books b
              JOIN users u ON b.user_id = u.id
             ORDER BY b.created_at DESC, b.id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_by_owner(&self, owner_id: i32) -> AppResult<Vec<Book>> {
        let rows = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, year, user_id, created_at, updated_at
              FROM books
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, year, user_id, created_at, updated_at
              FROM books
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn owner_of(&self, id: i32) -> AppResult<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as(r#"SELECT user_id FROM books WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    async fn update(&self, id: i32, book: &BookInput) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
               SET title = $1, author = $2, year = $3
             WHERE id = $4
            RETURNING id, title, author, year, user_id, created_at, updated_at
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            DELETE FROM books
             WHERE id = $1
            RETURNING id, title, author, year, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}
