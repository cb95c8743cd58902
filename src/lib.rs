pub mod app;
pub mod auth;
pub mod books;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod extract;
pub mod health;
pub mod middleware;
pub mod state;


pub use app::{build_app, serve};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;
