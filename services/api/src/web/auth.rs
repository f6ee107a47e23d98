//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for login and logout, plus the session-cookie helpers
//! shared with the verification flow.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_core::{AuthSession, CoreError};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::{extract::AppJson, state::AppState};

/// Lifetime of a login session.
const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Session Helpers
//=========================================================================================

/// Hashes a password with Argon2 and a fresh salt.
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn check_password_length(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ))
        .into());
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

/// Creates a login session for `user_id` and returns the `Set-Cookie` value.
pub async fn start_auth_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let auth_session_id = Uuid::new_v4().to_string();
    state
        .users
        .create_auth_session(AuthSession {
            id: auth_session_id.clone(),
            user_id,
            expires_at: Utc::now() + Duration::days(SESSION_DAYS),
        })
        .await?;

    Ok(format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    ))
}

/// Extracts the session id from the `Cookie` header, if any.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Get user by email
    let user_creds = state
        .users
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|_| CoreError::Unauthorized)?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err(CoreError::Unauthorized.into());
    }

    // 3. Create the auth session and cookie
    let cookie = start_auth_session(&state, user_creds.user_id).await?;
    info!(user_id = %user_creds.user_id, "User logged in");

    let response = AuthResponse {
        success: true,
        user_id: user_creds.user_id,
        email: user_creds.email,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = crate::error::ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let auth_session_id =
        session_id_from_headers(&headers).ok_or(CoreError::Unauthorized)?;

    state.users.delete_auth_session(auth_session_id).await?;

    // Clear cookie
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123"));
    }

    #[test]
    fn empty_or_missing_session_cookie_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id_from_headers(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_id_from_headers(&headers), None);
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("hunter22").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"hunter22", &parsed)
            .is_ok());
    }
}
