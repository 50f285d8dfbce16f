use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;

use crate::blacklist::BlacklistStore;
use crate::server::{AppState, errors::AppError};

/// Proof that the request carried the configured bearer token.
///
/// Use as a handler argument ahead of any body extractor so that
/// authentication is decided before the payload is looked at.
#[derive(Debug, Clone, Copy)]
pub struct BearerAuth;

impl<S: BlacklistStore> FromRequestParts<AppState<S>> for BearerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match token {
            Some(token) if token == state.bearer_token.expose_secret() => Ok(BearerAuth),
            Some(_) => {
                tracing::warn!("Rejected request with an invalid bearer token");
                Err(AppError::Unauthorized)
            }
            None => {
                tracing::warn!("Rejected request without a bearer token");
                Err(AppError::Unauthorized)
            }
        }
    }
}
