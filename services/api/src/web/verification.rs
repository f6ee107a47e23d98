//! services/api/src/web/verification.rs
//!
//! Signup by one-time code, over email or SMS. A successful verify creates the
//! account and logs the new user in.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_core::{
    verification::{email_contact, phone_contact},
    ContactKey, CoreError, PendingUserData, User, UserType,
};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::{
    auth::{check_password_length, hash_password, start_auth_session},
    extract::AppJson,
    state::AppState,
};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailSignupRequest {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    /// `guest` (default) or `host`.
    pub user_type: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhoneSignupRequest {
    pub phone_number: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    pub user_type: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct EmailVerifyRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhoneVerifyRequest {
    pub phone_number: String,
    pub otp: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EmailResendRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhoneResendRequest {
    pub phone_number: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub user_type: String,
}

impl From<User> for VerifiedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone_number: user.phone_number,
            user_type: user.user_type.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct VerifiedResponse {
    pub success: bool,
    pub message: String,
    pub user: VerifiedUser,
}

pub(crate) fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: text.to_string(),
    })
}

//=========================================================================================
// Shared Flow
//=========================================================================================

/// Validates the signup fields and hashes the password before anything is held.
fn pending_user_data(
    first_name: String,
    last_name: String,
    password: &str,
    user_type: Option<&str>,
) -> Result<PendingUserData, ApiError> {
    check_password_length(password)?;
    let user_type = match user_type {
        Some(raw) => raw.parse::<UserType>().map_err(CoreError::InvalidInput)?,
        None => UserType::default(),
    };
    Ok(PendingUserData {
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        password_hash: hash_password(password)?,
        user_type,
    })
}

async fn verify_and_login(
    state: &AppState,
    contact: &ContactKey,
    otp: &str,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.verification.verify_code(contact, otp).await?;
    let cookie = start_auth_session(state, user.user_id).await?;
    info!(user_id = %user.user_id, %contact, "Signup verified");

    let response = VerifiedResponse {
        success: true,
        message: "Account verified successfully".to_string(),
        user: user.into(),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

//=========================================================================================
// Email Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/verification/email/send",
    request_body = EmailSignupRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Invalid signup fields", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody),
        (status = 502, description = "Code could not be delivered", body = crate::error::ErrorBody),
        (status = 429, description = "Too many requests", body = crate::error::ErrorBody)
    )
)]
pub async fn send_email_code_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<EmailSignupRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let contact = email_contact(&req.email)?;
    let user_data = pending_user_data(
        req.first_name,
        req.last_name,
        &req.password,
        req.user_type.as_deref(),
    )?;
    state.verification.send_code(&contact, user_data).await?;
    Ok(message("Verification code sent to your email"))
}

#[utoipa::path(
    post,
    path = "/verification/email/verify",
    request_body = EmailVerifyRequest,
    responses(
        (status = 200, description = "Account created and logged in", body = VerifiedResponse),
        (status = 400, description = "SessionExpired, CodeExpired or InvalidCode", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody)
    )
)]
pub async fn verify_email_code_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<EmailVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = email_contact(&req.email)?;
    verify_and_login(&state, &contact, &req.otp).await
}

#[utoipa::path(
    post,
    path = "/verification/email/resend",
    request_body = EmailResendRequest,
    responses(
        (status = 200, description = "New code sent", body = MessageResponse),
        (status = 400, description = "No signup in progress", body = crate::error::ErrorBody),
        (status = 502, description = "Code could not be delivered", body = crate::error::ErrorBody),
        (status = 429, description = "Too many requests", body = crate::error::ErrorBody)
    )
)]
pub async fn resend_email_code_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<EmailResendRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let contact = email_contact(&req.email)?;
    state.verification.resend_code(&contact).await?;
    Ok(message("A new verification code has been sent to your email"))
}

//=========================================================================================
// Phone Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/verification/phone/send",
    request_body = PhoneSignupRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Invalid signup fields", body = crate::error::ErrorBody),
        (status = 409, description = "Phone number already registered", body = crate::error::ErrorBody),
        (status = 502, description = "Code could not be delivered", body = crate::error::ErrorBody),
        (status = 429, description = "Too many requests", body = crate::error::ErrorBody)
    )
)]
pub async fn send_phone_code_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<PhoneSignupRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let contact = phone_contact(&req.phone_number)?;
    let user_data = pending_user_data(
        req.first_name,
        req.last_name,
        &req.password,
        req.user_type.as_deref(),
    )?;
    state.verification.send_code(&contact, user_data).await?;
    Ok(message("Verification code sent to your phone"))
}

#[utoipa::path(
    post,
    path = "/verification/phone/verify",
    request_body = PhoneVerifyRequest,
    responses(
        (status = 200, description = "Account created and logged in", body = VerifiedResponse),
        (status = 400, description = "SessionExpired, CodeExpired or InvalidCode", body = crate::error::ErrorBody),
        (status = 409, description = "Phone number already registered", body = crate::error::ErrorBody)
    )
)]
pub async fn verify_phone_code_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<PhoneVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = phone_contact(&req.phone_number)?;
    verify_and_login(&state, &contact, &req.otp).await
}

#[utoipa::path(
    post,
    path = "/verification/phone/resend",
    request_body = PhoneResendRequest,
    responses(
        (status = 200, description = "New code sent", body = MessageResponse),
        (status = 400, description = "No signup in progress", body = crate::error::ErrorBody),
        (status = 502, description = "Code could not be delivered", body = crate::error::ErrorBody),
        (status = 429, description = "Too many requests", body = crate::error::ErrorBody)
    )
)]
pub async fn resend_phone_code_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<PhoneResendRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let contact = phone_contact(&req.phone_number)?;
    state.verification.resend_code(&contact).await?;
    Ok(message("A new verification code has been sent to your phone"))
}
