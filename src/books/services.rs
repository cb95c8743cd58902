use tracing::{info, warn};

use super::{
    dto::{BookInput, BookRequest},
    repo::BookStore,
    repo_types::{Book, BookWithOwner},
};
use crate::{
    auth::Identity,
    error::{AppError, AppResult},
};

pub const MISSING_FIELDS: &str = "Missing required fields";
pub const BOOK_NOT_FOUND: &str = "Book not found";

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Update,
    Delete,
}

impl Mutation {
    fn verb(self) -> &'static str {
        match self {
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        }
    }
}

pub fn validate(req: BookRequest) -> AppResult<BookInput> {
    let title = req.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let author = req.author.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
    // Zero counts as absent, like an empty string.
    let year = req.year.filter(|y| *y != 0);
    match (title, author, year) {
        (Some(title), Some(author), Some(year)) => Ok(BookInput {
            title,
            author,
            year,
        }),
        _ => Err(AppError::Validation(MISSING_FIELDS.into())),
    }
}

/// Looks the owner up fresh and compares it with the caller. Nothing about
/// ownership is remembered between calls.
async fn authorize(
    store: &dyn BookStore,
    id: i32,
    caller: &Identity,
    action: Mutation,
) -> AppResult<()> {
    let owner = store
        .owner_of(id)
        .await?
        .ok_or_else(|| AppError::NotFound(BOOK_NOT_FOUND.into()))?;
    if owner != caller.user_id {
        warn!(book_id = id, owner, caller = caller.user_id, action = action.verb(), "ownership check failed");
        return Err(AppError::Forbidden(format!(
            "Not authorized to {} this book",
            action.verb()
        )));
    }
    Ok(())
}

pub async fn create(store: &dyn BookStore, req: BookRequest, caller: &Identity) -> AppResult<Book> {
    let input = validate(req)?;
    let book = store.create(caller.user_id, &input).await?;
    info!(book_id = book.id, user_id = caller.user_id, "book created");
    Ok(book)
}

pub async fn list_all(store: &dyn BookStore) -> AppResult<Vec<BookWithOwner>> {
    store.list_all().await
}

pub async fn list_mine(store: &dyn BookStore, caller: &Identity) -> AppResult<Vec<Book>> {
    store.list_by_owner(caller.user_id).await
}

pub async fn get_by_id(store: &dyn BookStore, id: i32) -> AppResult<Book> {
    store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(BOOK_NOT_FOUND.into()))
}

// Check and write are separate statements; a concurrent delete between them
// surfaces as NotFound.
pub async fn update(
    store: &dyn BookStore,
    id: i32,
    req: BookRequest,
    caller: &Identity,
) -> AppResult<Book> {
    let input = validate(req)?;
    authorize(store, id, caller, Mutation::Update).await?;
    let book = store
        .update(id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(BOOK_NOT_FOUND.into()))?;
    info!(book_id = id, user_id = caller.user_id, "book updated");
    Ok(book)
}

pub async fn delete(store: &dyn BookStore, id: i32, caller: &Identity) -> AppResult<Book> {
    authorize(store, id, caller, Mutation::Delete).await?;
    let book = store
        .delete(id)
        .await?
        .ok_or_else(|| AppError::NotFound(BOOK_NOT_FOUND.into()))?;
    info!(book_id = id, user_id = caller.user_id, "book deleted");
    Ok(book)
}
