//! services/api/src/web/password_reset.rs
//!
//! Forgotten-password flow: request an emailed link, check its token, then set
//! a new password with it.

use axum::{extract::State, response::Json};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::{
    auth::{check_password_length, hash_password},
    extract::{AppJson, AppPath},
    state::AppState,
    verification::{message, MessageResponse},
};

#[derive(Deserialize, ToSchema)]
pub struct ResetLinkRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Emails a reset link. Answers the same whether or not the address has an account.
#[utoipa::path(
    post,
    path = "/password-reset/request",
    request_body = ResetLinkRequest,
    responses(
        (status = 200, description = "Link sent if the account exists", body = MessageResponse),
        (status = 400, description = "Malformed email", body = crate::error::ErrorBody),
        (status = 429, description = "Too many requests", body = crate::error::ErrorBody),
        (status = 502, description = "Link could not be delivered", body = crate::error::ErrorBody)
    )
)]
pub async fn request_reset_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ResetLinkRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.password_reset.request_reset(&req.email).await?;
    Ok(message(
        "If an account exists with that email, a password reset link has been sent.",
    ))
}

#[utoipa::path(
    get,
    path = "/password-reset/validate/{token}",
    params(("token" = String, Path, description = "Token from the emailed link")),
    responses(
        (status = 200, description = "Token is valid", body = MessageResponse),
        (status = 400, description = "InvalidResetToken", body = crate::error::ErrorBody)
    )
)]
pub async fn validate_token_handler(
    State(state): State<Arc<AppState>>,
    AppPath(token): AppPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.password_reset.validate_token(&token).await?;
    Ok(message("Token is valid"))
}

#[utoipa::path(
    post,
    path = "/password-reset/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "InvalidResetToken or a short password", body = crate::error::ErrorBody),
        (status = 429, description = "Too many requests", body = crate::error::ErrorBody)
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    check_password_length(&req.new_password)?;
    let password_hash = hash_password(&req.new_password)?;
    state
        .password_reset
        .reset_password(&req.token, &password_hash)
        .await?;
    Ok(message(
        "Password reset successfully! You can now log in with your new password.",
    ))
}
