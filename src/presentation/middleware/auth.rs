//! Authentication Middleware
//!
//! JWT verification for protected routes. Tokens are issued elsewhere; the
//! relay only checks the signature and expiry and turns the claims into the
//! [`Identity`] the core consumes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::Identity;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Authenticated user extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

impl AuthUser {
    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone(), self.username.clone())
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
        }
    }
}

/// Verify an HS256 token and return its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".into())
        }
        _ => AppError::Unauthorized("Invalid token".into()),
    })?;

    let claims = token_data.claims;
    if claims.sub.is_empty() || claims.username.is_empty() {
        return Err(AppError::Unauthorized("Invalid token claims".into()));
    }
    Ok(claims)
}

/// Authentication middleware that validates JWT bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let TypedHeader(Authorization(bearer)) = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AppError::Unauthorized("Missing authorization header".into()))?;

    let claims = verify_token(bearer.token(), &state.settings.jwt.secret)?;

    // Insert authenticated user into request extensions
    parts.extensions.insert(AuthUser::from(claims));

    // Continue to the next handler
    Ok(next.run(Request::from_parts(parts, body)).await)
}
