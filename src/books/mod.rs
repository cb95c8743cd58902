pub mod dto;
pub mod handlers;
pub mod repo;
mod repo_types;
pub mod services;

pub use repo::{BookStore, PgBookStore};
pub use repo_types::{Book, BookWithOwner};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::book_routes()
}
