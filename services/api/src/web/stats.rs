//! services/api/src/web/stats.rs
//!
//! Engagement endpoints: the stats snapshot, time tracking and activity counters.
//! All routes here sit behind `require_auth`.

use axum::{extract::State, response::Json, Extension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_core::{ActivityCounter, CoreError, StatsSnapshot};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::{extract::AppJson, state::AppState};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsBody {
    pub weekly_time_hours: f64,
    pub current_streak: u32,
    pub quizzes_completed: u64,
    pub materials_reviewed: u64,
    pub ai_conversations: u64,
    pub total_time_hours: f64,
}

impl From<StatsSnapshot> for StatsBody {
    fn from(s: StatsSnapshot) -> Self {
        Self {
            weekly_time_hours: s.weekly_time_hours,
            current_streak: s.current_streak,
            quizzes_completed: s.quizzes_completed,
            materials_reviewed: s.materials_reviewed,
            ai_conversations: s.ai_conversations,
            total_time_hours: s.total_time_hours,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsOwner {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: StatsBody,
    pub user: StatsOwner,
}

#[derive(Deserialize, ToSchema)]
pub struct TrackTimeRequest {
    /// Minutes of study to add. Fractions are rounded to the nearest minute.
    pub minutes: Option<f64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTimeBody {
    pub weekly_time_hours: f64,
    pub current_streak: u32,
}

#[derive(Serialize, ToSchema)]
pub struct TrackTimeResponse {
    pub success: bool,
    pub stats: TrackedTimeBody,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizCountResponse {
    pub success: bool,
    pub quizzes_completed: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialCountResponse {
    pub success: bool,
    pub materials_reviewed: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCountResponse {
    pub success: bool,
    pub ai_conversations: u64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Returns the caller's engagement stats, applying any pending weekly reset.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Current stats", body = StatsResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody),
        (status = 404, description = "User no longer exists", body = crate::error::ErrorBody)
    )
)]
pub async fn get_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<StatsResponse>, ApiError> {
    let user_stats = state.tracker.get_stats(user_id).await?;
    Ok(Json(StatsResponse {
        success: true,
        stats: user_stats.stats.into(),
        user: StatsOwner {
            first_name: user_stats.first_name,
            last_name: user_stats.last_name,
            email: user_stats.email,
        },
    }))
}

/// Adds study minutes and marks today as active.
#[utoipa::path(
    post,
    path = "/stats/track-time",
    request_body = TrackTimeRequest,
    responses(
        (status = 200, description = "Time recorded", body = TrackTimeResponse),
        (status = 400, description = "Missing or invalid minutes", body = crate::error::ErrorBody),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn track_time_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppJson(req): AppJson<TrackTimeRequest>,
) -> Result<Json<TrackTimeResponse>, ApiError> {
    let minutes = req
        .minutes
        .ok_or_else(|| CoreError::InvalidInput("minutes is required".to_string()))?;

    let tracked = state.tracker.track_time(user_id, minutes).await?;
    info!(%user_id, minutes, "Study time tracked");

    Ok(Json(TrackTimeResponse {
        success: true,
        stats: TrackedTimeBody {
            weekly_time_hours: tracked.weekly_time_hours,
            current_streak: tracked.current_streak,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/stats/increment-quiz",
    responses(
        (status = 200, description = "Quiz counted", body = QuizCountResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn increment_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<QuizCountResponse>, ApiError> {
    let quizzes_completed = state
        .tracker
        .increment(user_id, ActivityCounter::Quiz)
        .await?;
    Ok(Json(QuizCountResponse {
        success: true,
        quizzes_completed,
    }))
}

#[utoipa::path(
    post,
    path = "/stats/increment-material",
    responses(
        (status = 200, description = "Material counted", body = MaterialCountResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn increment_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<MaterialCountResponse>, ApiError> {
    let materials_reviewed = state
        .tracker
        .increment(user_id, ActivityCounter::Material)
        .await?;
    Ok(Json(MaterialCountResponse {
        success: true,
        materials_reviewed,
    }))
}

/// Counts an AI conversation. Does not mark the day as active.
#[utoipa::path(
    post,
    path = "/stats/increment-conversation",
    responses(
        (status = 200, description = "Conversation counted", body = ConversationCountResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn increment_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<ConversationCountResponse>, ApiError> {
    let ai_conversations = state
        .tracker
        .increment(user_id, ActivityCounter::Conversation)
        .await?;
    Ok(Json(ConversationCountResponse {
        success: true,
        ai_conversations,
    }))
}
