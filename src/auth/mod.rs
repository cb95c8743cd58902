mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
mod repo_types;
pub mod services;

pub use claims::{Claims, Identity};
pub use extractors::AuthUser;
pub use jwt::JwtKeys;
pub use repo::{PgUserStore, UserStore};
pub use repo_types::User;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
