//! JWT-based authentication extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use atelier_core::access::Requester;
use atelier_core::error::CoreError;
use atelier_core::types::UserId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the
/// `Authorization` header. Rejects the request with 401 when the header is
/// missing or the token is invalid.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl AuthUser {
    pub fn requester(&self) -> Requester {
        Requester::User(self.user_id)
    }
}

/// Optional authentication for endpoints that also serve anonymous
/// requesters (listing, public project reads, duplication).
///
/// A missing or invalid token degrades to anonymous instead of rejecting,
/// matching the legacy optional-auth behavior.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<UserId>);

impl MaybeAuthUser {
    pub fn requester(&self) -> Requester {
        match self.0 {
            Some(user_id) => Requester::User(user_id),
            None => Requester::Anonymous,
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = bearer_token(parts)
            .and_then(|token| validate_token(token, &state.config.jwt).ok())
            .map(|claims| claims.sub);
        Ok(MaybeAuthUser(user_id))
    }
}
