use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::repo_types::Book;

/// Body of create and update. All three fields are required; they are
/// optional here so absence maps to "Missing required fields".
#[derive(Debug, Deserialize, ToSchema)]
pub struct BookRequest {
    #[schema(example = "Dune")]
    pub title: Option<String>,
    #[schema(example = "Frank Herbert")]
    pub author: Option<String>,
    #[schema(example = 1965)]
    pub year: Option<i32>,
}

/// Validated book fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub year: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookResponse {
    pub message: String,
    pub book: Book,
}
