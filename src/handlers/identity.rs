use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

pub const IDENTITY_HEADER: &str = "x-user-id";

/// Opaque session identity of the caller, populated by the fronting session layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| SessionIdentity(id.to_string()))
            .ok_or_else(AppError::unauthorized)
    }
}
