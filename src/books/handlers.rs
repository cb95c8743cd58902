use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{BookRequest, BookResponse},
    repo_types::{Book, BookWithOwner},
    services,
};
use crate::{
    auth::AuthUser,
    error::{AppResult, ErrorBody},
    extract::{AppJson, AppPath},
    state::AppState,
};

pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/my", get(list_my_books))
        .route("/:id", get(get_book).put(update_book).delete(delete_book))
}

#[utoipa::path(
    post,
    path = "/api/books",
    tag = "books",
    request_body = BookRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Missing required fields", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    )
)]
#[instrument(skip(state, caller, payload), fields(user_id = caller.user_id))]
pub async fn create_book(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(payload): AppJson<BookRequest>,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    let book = services::create(state.books.as_ref(), payload, &caller).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: "Book added successfully".into(),
            book,
        }),
    ))
}

/// Every book with its owner, newest first.
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All books", body = [BookWithOwner]),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    )
)]
#[instrument(skip(state, caller), fields(user_id = caller.user_id))]
pub async fn list_books(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> AppResult<Json<Vec<BookWithOwner>>> {
    Ok(Json(services::list_all(state.books.as_ref()).await?))
}

/// Books owned by the caller, newest first.
#[utoipa::path(
    get,
    path = "/api/books/my",
    tag = "books",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's books", body = [Book]),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    )
)]
#[instrument(skip(state, caller), fields(user_id = caller.user_id))]
pub async fn list_my_books(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(services::list_mine(state.books.as_ref(), &caller).await?))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The book", body = Book),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody),
        (status = 404, description = "Book not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    )
)]
#[instrument(skip(state, caller), fields(user_id = caller.user_id))]
pub async fn get_book(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<Book>> {
    Ok(Json(services::get_by_id(state.books.as_ref(), id).await?))
}

/// Owner only.
#[utoipa::path(
    put,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book id")),
    request_body = BookRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 400, description = "Missing required fields", body = ErrorBody),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody),
        (status = 403, description = "Caller does not own the book", body = ErrorBody),
        (status = 404, description = "Book not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    )
)]
#[instrument(skip(state, caller, payload), fields(user_id = caller.user_id))]
pub async fn update_book(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<BookRequest>,
) -> AppResult<Json<BookResponse>> {
    let book = services::update(state.books.as_ref(), id, payload, &caller).await?;
    Ok(Json(BookResponse {
        message: "Book updated successfully".into(),
        book,
    }))
}

/// Owner only. Responds with the row as it was before deletion.
#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Book deleted", body = BookResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody),
        (status = 403, description = "Caller does not own the book", body = ErrorBody),
        (status = 404, description = "Book not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody),
    )
)]
#[instrument(skip(state, caller), fields(user_id = caller.user_id))]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<BookResponse>> {
    let book = services::delete(state.books.as_ref(), id, &caller).await?;
    Ok(Json(BookResponse {
        message: "Book deleted successfully".into(),
        book,
    }))
}
