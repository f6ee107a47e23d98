//! services/api/src/web/rest.rs
//!
//! The health probe and the master definition for the OpenAPI specification.

use axum::response::Json;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::web::{auth, notebooks, password_reset, stats, verification};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::login_handler,
        auth::logout_handler,
        stats::get_stats_handler,
        stats::track_time_handler,
        stats::increment_quiz_handler,
        stats::increment_material_handler,
        stats::increment_conversation_handler,
        verification::send_email_code_handler,
        verification::verify_email_code_handler,
        verification::resend_email_code_handler,
        verification::send_phone_code_handler,
        verification::verify_phone_code_handler,
        verification::resend_phone_code_handler,
        password_reset::request_reset_handler,
        password_reset::validate_token_handler,
        password_reset::reset_password_handler,
        notebooks::create_notebook_handler,
        notebooks::list_notebooks_handler,
        notebooks::recent_notebooks_handler,
        notebooks::featured_notebooks_handler,
        notebooks::search_notebooks_handler,
        notebooks::get_notebook_handler,
        notebooks::update_notebook_handler,
        notebooks::delete_notebook_handler,
        notebooks::toggle_featured_handler,
    ),
    components(
        schemas(
            HealthResponse,
            crate::error::ErrorBody,
            auth::LoginRequest,
            auth::AuthResponse,
            stats::StatsResponse,
            stats::TrackTimeRequest,
            stats::TrackTimeResponse,
            verification::EmailSignupRequest,
            verification::PhoneSignupRequest,
            verification::MessageResponse,
            verification::VerifiedResponse,
            password_reset::ResetLinkRequest,
            password_reset::ResetPasswordRequest,
            notebooks::CreateNotebookRequest,
            notebooks::UpdateNotebookRequest,
            notebooks::NotebookResponse,
            notebooks::NotebookListResponse,
            notebooks::SearchResponse,
        )
    ),
    tags(
        (name = "Study Tracker API", description = "Engagement stats, signup verification, password reset and study notebooks.")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
