//! services/api/src/web/notebooks.rs
//!
//! CRUD and search over the caller's notebooks.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_core::{
    notebooks::summary_preview, CoreError, Listing, NewNotebook, Notebook, NotebookUpdate,
    SourceType, SummaryLength,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::{
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotebookBody {
    pub id: Uuid,
    pub title: String,
    pub original_text: String,
    pub summary: String,
    pub summary_length: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub source_type: String,
    pub source_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Notebook> for NotebookBody {
    fn from(nb: Notebook) -> Self {
        Self {
            id: nb.id,
            title: nb.title,
            original_text: nb.original_text,
            summary: nb.summary,
            summary_length: nb.summary_length.as_str().to_string(),
            category: nb.category,
            tags: nb.tags,
            is_featured: nb.is_featured,
            source_type: nb.source_type.as_str().to_string(),
            source_file_name: nb.source_file_name,
            created_at: nb.created_at,
            updated_at: nb.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotebookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub summary: String,
    /// `short`, `medium` (default) or `long`.
    pub summary_length: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// `text` (default), `pdf` or `file`.
    pub source_type: Option<String>,
    pub source_file_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotebookRequest {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
}

impl From<UpdateNotebookRequest> for NotebookUpdate {
    fn from(req: UpdateNotebookRequest) -> Self {
        Self {
            title: req.title,
            summary: req.summary,
            category: req.category,
            tags: req.tags,
            is_featured: req.is_featured,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct NotebookResponse {
    pub success: bool,
    pub notebook: NotebookBody,
}

#[derive(Serialize, ToSchema)]
pub struct NotebookListResponse {
    pub success: bool,
    pub count: usize,
    pub notebooks: Vec<NotebookBody>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Text to look for in titles, summaries, categories and tags.
    pub q: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: Uuid,
    pub title: String,
    pub summary_preview: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notebook> for SearchHit {
    fn from(nb: Notebook) -> Self {
        Self {
            id: nb.id,
            summary_preview: summary_preview(&nb.summary),
            title: nb.title,
            category: nb.category,
            tags: nb.tags,
            is_featured: nb.is_featured,
            created_at: nb.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFeaturedResponse {
    pub success: bool,
    pub is_featured: bool,
}

#[derive(Serialize, ToSchema)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: String,
}

fn listing_response(notebooks: Vec<Notebook>) -> Json<NotebookListResponse> {
    Json(NotebookListResponse {
        success: true,
        count: notebooks.len(),
        notebooks: notebooks.into_iter().map(NotebookBody::from).collect(),
    })
}

fn parse_optional<T>(raw: Option<String>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.map(|s| s.parse::<T>().map_err(CoreError::InvalidInput))
        .transpose()
        .map_err(ApiError::from)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Saves a new notebook. Counts as a reviewed material for the caller.
#[utoipa::path(
    post,
    path = "/notebooks",
    request_body = CreateNotebookRequest,
    responses(
        (status = 201, description = "Notebook saved", body = NotebookResponse),
        (status = 400, description = "Missing required fields", body = crate::error::ErrorBody),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn create_notebook_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppJson(req): AppJson<CreateNotebookRequest>,
) -> Result<(StatusCode, Json<NotebookResponse>), ApiError> {
    let new = NewNotebook {
        title: req.title,
        original_text: req.original_text,
        summary: req.summary,
        summary_length: parse_optional::<SummaryLength>(req.summary_length)?,
        category: req.category,
        tags: req.tags,
        source_type: parse_optional::<SourceType>(req.source_type)?,
        source_file_name: req.source_file_name,
    };
    let notebook = state.notebooks.create(user_id, new).await?;
    Ok((
        StatusCode::CREATED,
        Json(NotebookResponse {
            success: true,
            notebook: notebook.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/notebooks",
    responses(
        (status = 200, description = "The caller's notebooks, newest first", body = NotebookListResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn list_notebooks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<NotebookListResponse>, ApiError> {
    let notebooks = state.notebooks.list(user_id, Listing::All).await?;
    Ok(listing_response(notebooks))
}

#[utoipa::path(
    get,
    path = "/notebooks/recent",
    responses(
        (status = 200, description = "The most recent notebooks", body = NotebookListResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn recent_notebooks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<NotebookListResponse>, ApiError> {
    let notebooks = state.notebooks.list(user_id, Listing::Recent).await?;
    Ok(listing_response(notebooks))
}

#[utoipa::path(
    get,
    path = "/notebooks/featured",
    responses(
        (status = 200, description = "Featured notebooks", body = NotebookListResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn featured_notebooks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<NotebookListResponse>, ApiError> {
    let notebooks = state.notebooks.list(user_id, Listing::Featured).await?;
    Ok(listing_response(notebooks))
}

/// Literal, case-insensitive search. A blank query returns no results.
#[utoipa::path(
    get,
    path = "/notebooks/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching notebooks", body = SearchResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn search_notebooks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let raw = params.q.unwrap_or_default();
    let (query, found) = state.notebooks.search(user_id, &raw).await?;
    Ok(Json(SearchResponse {
        success: true,
        query,
        count: found.len(),
        results: found.into_iter().map(SearchHit::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/notebooks/{id}",
    params(("id" = Uuid, Path, description = "Notebook id")),
    responses(
        (status = 200, description = "The notebook", body = NotebookResponse),
        (status = 404, description = "No such notebook for this user", body = crate::error::ErrorBody)
    )
)]
pub async fn get_notebook_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(notebook_id): AppPath<Uuid>,
) -> Result<Json<NotebookResponse>, ApiError> {
    let notebook = state.notebooks.get(user_id, notebook_id).await?;
    Ok(Json(NotebookResponse {
        success: true,
        notebook: notebook.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/notebooks/{id}",
    params(("id" = Uuid, Path, description = "Notebook id")),
    request_body = UpdateNotebookRequest,
    responses(
        (status = 200, description = "Updated notebook", body = NotebookResponse),
        (status = 404, description = "No such notebook for this user", body = crate::error::ErrorBody)
    )
)]
pub async fn update_notebook_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(notebook_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateNotebookRequest>,
) -> Result<Json<NotebookResponse>, ApiError> {
    let notebook = state
        .notebooks
        .update(user_id, notebook_id, req.into())
        .await?;
    Ok(Json(NotebookResponse {
        success: true,
        notebook: notebook.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/notebooks/{id}",
    params(("id" = Uuid, Path, description = "Notebook id")),
    responses(
        (status = 200, description = "Notebook deleted", body = DeletedResponse),
        (status = 404, description = "No such notebook for this user", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_notebook_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(notebook_id): AppPath<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    state.notebooks.delete(user_id, notebook_id).await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: "Notebook deleted successfully".to_string(),
    }))
}

#[utoipa::path(
    patch,
    path = "/notebooks/{id}/toggle-featured",
    params(("id" = Uuid, Path, description = "Notebook id")),
    responses(
        (status = 200, description = "New featured flag", body = ToggleFeaturedResponse),
        (status = 404, description = "No such notebook for this user", body = crate::error::ErrorBody)
    )
)]
pub async fn toggle_featured_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    AppPath(notebook_id): AppPath<Uuid>,
) -> Result<Json<ToggleFeaturedResponse>, ApiError> {
    let is_featured = state.notebooks.toggle_featured(user_id, notebook_id).await?;
    Ok(Json(ToggleFeaturedResponse {
        success: true,
        is_featured,
    }))
}
