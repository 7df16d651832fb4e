use crate::{
    app_state::AppState,
    error::{ApiError, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

/// Request extension storing verified user identity from JWT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// The token's `sub` claim; task ownership is keyed on it
    pub subject: String,
}

/// JWT authentication middleware
///
/// Extracts the Authorization header, validates the bearer token against the
/// configured secret, issuer and audience, and stores the verified identity in
/// request extensions.
///
/// Returns 401 Unauthorized if the header is missing or token validation fails.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthorized(
            "Invalid Authorization format, expected 'Bearer <token>'".to_string(),
        )
    })?;

    let claims = state.jwt.validate_token(token)?;

    request
        .extensions_mut()
        .insert(UserIdentity { subject: claims.sub });

    Ok(next.run(request).await)
}

/// Axum extractor for user identity
///
/// Only works on routes protected by jwt_auth_middleware.
impl<S> FromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserIdentity>()
            .cloned()
            .ok_or_else(|| {
                ApiError::Unauthorized(
                    "User identity not found - route must be protected by jwt_auth_middleware"
                        .to_string(),
                )
            })
    }
}

/// `Option<UserIdentity>` for routes shared by anonymous and authenticated callers.
impl<S> OptionalFromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<UserIdentity>().cloned())
    }
}
