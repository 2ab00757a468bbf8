//! Caller identity extraction.
//!
//! The gateway in front of this service verifies sessions and forwards the
//! result as trusted headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Identity, Role, UserId};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// An authenticated caller. Rejects with 403 when the headers are absent
/// or malformed.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| ApiError::PermissionDenied("authentication required".to_string()))?
            .parse::<i64>()
            .map_err(|_| ApiError::PermissionDenied("malformed user id".to_string()))?;
        let role = match header(USER_ROLE_HEADER) {
            Some(role) => role
                .parse::<Role>()
                .map_err(ApiError::PermissionDenied)?,
            None => Role::User,
        };

        Ok(Caller(Identity::new(UserId::new(user_id), role)))
    }
}
