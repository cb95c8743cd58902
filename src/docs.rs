use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, books, error, health};

#[derive(OpenApi)]
#[openapi(
    info(title = "Bookshelf API", description = "Books with per-user ownership"),
    paths(
        health::health_check,
        auth::handlers::register,
        auth::handlers::login,
        books::handlers::create_book,
        books::handlers::list_books,
        books::handlers::list_my_books,
        books::handlers::get_book,
        books::handlers::update_book,
        books::handlers::delete_book,
    ),
    components(schemas(
        error::ErrorBody,
        health::HealthResponse,
        auth::dto::RegisterRequest,
        auth::dto::LoginRequest,
        auth::dto::RegisteredUser,
        auth::dto::PublicUser,
        auth::dto::RegisterResponse,
        auth::dto::LoginResponse,
        books::dto::BookRequest,
        books::dto::BookResponse,
        books::Book,
        books::BookWithOwner,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration and login"),
        (name = "books", description = "Book CRUD, bearer token required"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/health",
            "/api/auth/register",
            "/api/auth/login",
            "/api/books",
            "/api/books/my",
            "/api/books/{id}",
        ] {
            assert!(paths.contains_key(path), "{path}");
        }
        assert!(doc["components"]["securitySchemes"]["bearer"].is_object());
    }
}
