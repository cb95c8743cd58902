use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;

use super::{claims::Identity, jwt::JwtKeys};
use crate::error::AppError;

/// Auth gate for protected handlers. Reads `Authorization: Bearer <token>`,
/// verifies it and yields the caller's identity. Identity never comes from
/// the body or query string.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthenticated("No token provided".into()))?;

        let keys = JwtKeys::from_ref(state);
        let identity = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            AppError::from(e)
        })?;

        Ok(AuthUser(identity))
    }
}
