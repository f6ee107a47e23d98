//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use study_core::CoreError;
use tracing::warn;

use crate::error::ApiError;
use crate::web::{auth::session_id_from_headers, state::AppState};

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, responds with the `Unauthorized` envelope.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Parse session ID from the cookie header
    let auth_session_id = session_id_from_headers(req.headers())
        .ok_or(CoreError::Unauthorized)?
        .to_string();

    // 2. Validate auth session, get user_id
    let user_id = state
        .users
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            warn!("Rejected auth session: {:?}", e);
            CoreError::Unauthorized
        })?;

    // 3. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
