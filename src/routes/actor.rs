use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::constants::{ERR_MISSING_USER, USER_ID_HEADER};
use crate::error::AppError;

/// Authenticated caller, as forwarded by the auth gateway in `X-User-Id`
#[derive(Debug, Clone)]
pub struct Actor(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Actor(id.to_string()))
            .ok_or_else(|| AppError::Unauthorized(ERR_MISSING_USER.to_string()))
    }
}
