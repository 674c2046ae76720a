//! Structure handlers: create, list, get.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{Structure, StructureId, StructureSlug};
use crate::error::{ClockError, ErrorResponse};
use crate::service::StructureDraft;

/// `POST /structures`: Create a structure.
///
/// # Errors
///
/// Returns [`ClockError::InvalidRequest`] for a blank name or bad levels.
#[utoipa::path(
    post,
    path = "/api/v1/structures",
    tag = "Structures",
    summary = "Create a structure",
    request_body = StructureDraft,
    responses(
        (status = 201, description = "Structure created", body = Structure),
        (status = 400, description = "Invalid structure", body = ErrorResponse),
    )
)]
pub async fn create_structure(
    State(state): State<AppState>,
    Json(draft): Json<StructureDraft>,
) -> Result<impl IntoResponse, ClockError> {
    let structure = state.service.create_structure(draft).await?;
    Ok((StatusCode::CREATED, Json(structure)))
}

/// `GET /structures`: List structures.
///
/// # Errors
///
/// Returns [`ClockError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/structures",
    tag = "Structures",
    summary = "List structures",
    responses(
        (status = 200, description = "All structures", body = Vec<StructureSlug>),
    )
)]
pub async fn list_structures(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ClockError> {
    Ok(Json(state.service.list_structures().await?))
}

/// `GET /structures/{id}`: Get a structure.
///
/// # Errors
///
/// Returns [`ClockError::StructureNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/structures/{id}",
    tag = "Structures",
    summary = "Get a structure",
    params(
        ("id" = i64, Path, description = "Structure id"),
    ),
    responses(
        (status = 200, description = "Structure", body = Structure),
        (status = 404, description = "Structure not found", body = ErrorResponse),
    )
)]
pub async fn get_structure(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ClockError> {
    Ok(Json(
        state.service.fetch_structure(StructureId::new(id)).await?,
    ))
}

/// Structure routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/structures", post(create_structure).get(list_structures))
        .route("/structures/{id}", get(get_structure))
}
