//! Authentication Middleware
//!
//! JWT validation for protected routes. The bearer token is verified
//! against the shared secret, then the acting user is loaded so
//! downstream handlers get a full account, not just a subject ID.
//! Deactivated accounts are rejected here, before any handler runs.

use axum::{
    extract::{Extension, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::{User, UserRepository};
use crate::infrastructure::repositories::PgUserRepository;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Authenticated user extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

/// Authentication middleware that validates JWT tokens and loads the
/// acting user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    // Check for Bearer token
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    // Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.settings.jwt.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".into())
        }
        _ => AppError::Unauthorized("Invalid token".into()),
    })?;

    // Parse user ID from claims
    let user_id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token claims".into()))?;

    // Load the user behind the token
    let user_repo = PgUserRepository::new(state.db.clone());
    let user = user_repo
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if !user.is_active {
        return Err(AppError::Unauthorized("User account is deactivated".into()));
    }

    // Insert authenticated user into request extensions
    request.extensions_mut().insert(AuthUser { user });

    // Continue to the next handler
    Ok(next.run(request).await)
}

/// Requires a verified email address. Runs after `auth_middleware`.
pub async fn require_verified(
    Extension(auth): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !auth.user.is_email_verified {
        return Err(AppError::Forbidden(
            "Please verify your email address".into(),
        ));
    }
    Ok(next.run(request).await)
}

/// Restricts the route to staff roles (support, admin). Runs after
/// `auth_middleware`.
pub async fn require_staff(
    Extension(auth): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !auth.user.role.is_staff() {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".into(),
        ));
    }
    Ok(next.run(request).await)
}
