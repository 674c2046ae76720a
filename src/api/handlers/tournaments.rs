//! Tournament handlers: create, list, get, delete, mutate.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{PaginationMeta, PaginationParams, TournamentListResponse};
use crate::app_state::AppState;
use crate::domain::Mutation;
use crate::error::{ClockError, ErrorResponse};
use crate::service::TournamentDraft;

/// `POST /tournaments`: Create a tournament.
///
/// # Errors
///
/// Returns [`ClockError`] on validation failure or an unknown structure.
#[utoipa::path(
    post,
    path = "/api/v1/tournaments",
    tag = "Tournaments",
    summary = "Create a tournament",
    description = "Creates a paused tournament at the first level of the given structure, with every count at zero.",
    request_body = TournamentDraft,
    responses(
        (status = 201, description = "Tournament created", body = serde_json::Value),
        (status = 400, description = "Invalid request or handle in use", body = ErrorResponse),
        (status = 404, description = "Structure not found", body = ErrorResponse),
    )
)]
pub async fn create_tournament(
    State(state): State<AppState>,
    Json(draft): Json<TournamentDraft>,
) -> Result<impl IntoResponse, ClockError> {
    let tournament = state.service.create_tournament(draft).await?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

/// `GET /tournaments`: List tournaments.
///
/// # Errors
///
/// Returns [`ClockError::InvalidRequest`] for bad paging.
#[utoipa::path(
    get,
    path = "/api/v1/tournaments",
    tag = "Tournaments",
    summary = "List tournaments",
    description = "Returns tournaments ordered by id using offset paging.",
    params(PaginationParams),
    responses(
        (status = 200, description = "A page of tournaments", body = TournamentListResponse),
        (status = 400, description = "Invalid paging", body = ErrorResponse),
    )
)]
pub async fn list_tournaments(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ClockError> {
    let params = params.clamped();
    let data = state
        .service
        .list_tournaments(params.offset, params.limit)
        .await?;
    Ok(Json(TournamentListResponse {
        pagination: PaginationMeta {
            offset: params.offset,
            limit: params.limit,
            count: data.len(),
        },
        data,
    }))
}

/// `GET /tournaments/{id}`: Get a tournament.
///
/// # Errors
///
/// Returns [`ClockError::TournamentNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/v1/tournaments/{id}",
    tag = "Tournaments",
    summary = "Get a tournament",
    description = "Returns the tournament reconciled to the current instant, with derived values filled in.",
    params(
        ("id" = i64, Path, description = "Tournament id"),
    ),
    responses(
        (status = 200, description = "Tournament", body = serde_json::Value),
        (status = 404, description = "Tournament not found", body = ErrorResponse),
    )
)]
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ClockError> {
    let tournament = state
        .service
        .fetch_tournament(super::tournament_id(id)?)
        .await?;
    Ok(Json(tournament))
}

/// `DELETE /tournaments/{id}`: Delete a tournament.
///
/// # Errors
///
/// Returns [`ClockError::TournamentNotFound`] for an unknown id.
#[utoipa::path(
    delete,
    path = "/api/v1/tournaments/{id}",
    tag = "Tournaments",
    summary = "Delete a tournament",
    description = "Deletes the tournament. Viewers waiting on it are answered with 410 Gone.",
    params(
        ("id" = i64, Path, description = "Tournament id"),
    ),
    responses(
        (status = 204, description = "Tournament deleted"),
        (status = 404, description = "Tournament not found", body = ErrorResponse),
    )
)]
pub async fn delete_tournament(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ClockError> {
    state
        .service
        .delete_tournament(super::tournament_id(id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /tournaments/{id}/mutations`: Apply one mutation.
///
/// # Errors
///
/// Returns the mutation's [`ClockError`], or
/// [`ClockError::VersionConflict`] if another writer saved first.
#[utoipa::path(
    post,
    path = "/api/v1/tournaments/{id}/mutations",
    tag = "Tournaments",
    summary = "Apply a mutation",
    description = "Applies a single clock transition and saves it with the version that was read.",
    params(
        ("id" = i64, Path, description = "Tournament id"),
    ),
    request_body = Mutation,
    responses(
        (status = 200, description = "Updated tournament", body = serde_json::Value),
        (status = 400, description = "Invalid mutation", body = ErrorResponse),
        (status = 404, description = "Tournament not found", body = ErrorResponse),
        (status = 409, description = "Concurrent modification", body = ErrorResponse),
        (status = 422, description = "Transition not possible at this level", body = ErrorResponse),
    )
)]
pub async fn apply_mutation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mutation): Json<Mutation>,
) -> Result<impl IntoResponse, ClockError> {
    let tournament = state
        .service
        .apply(super::tournament_id(id)?, mutation)
        .await?;
    Ok(Json(tournament))
}

/// Tournament routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tournaments",
            post(create_tournament).get(list_tournaments),
        )
        .route(
            "/tournaments/{id}",
            get(get_tournament).delete(delete_tournament),
        )
        .route("/tournaments/{id}/mutations", post(apply_mutation))
}
