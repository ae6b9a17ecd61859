//! Caller identity.
//!
//! Authentication happens upstream of this service; the gateway forwards the
//! verified user id in the `X-User-Id` header.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Authenticated user extractor.
///
/// Rejects the request with 401 when the header is missing or blank.
pub struct Authenticated {
    pub user_id: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        Ok(Authenticated {
            user_id: user_id.to_string(),
        })
    }
}
