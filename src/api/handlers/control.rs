//! Endpoints used by clock pages: keyboard control and the long-poll.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{KeyboardControlRequest, ListenRequest};
use crate::app_state::AppState;
use crate::error::{ClockError, ErrorResponse};

/// `POST /api/keyboard-control`: Apply a keyboard shortcut.
///
/// # Errors
///
/// Returns the mutation's [`ClockError`].
#[utoipa::path(
    post,
    path = "/api/keyboard-control",
    tag = "Control",
    summary = "Apply a keyboard shortcut",
    description = "Maps a named key (shift multiplies counts by ten) to one mutation and applies it.",
    request_body = KeyboardControlRequest,
    responses(
        (status = 200, description = "Updated tournament", body = serde_json::Value),
        (status = 404, description = "Tournament not found", body = ErrorResponse),
        (status = 409, description = "Concurrent modification", body = ErrorResponse),
        (status = 422, description = "Transition not possible at this level", body = ErrorResponse),
    )
)]
pub async fn keyboard_control(
    State(state): State<AppState>,
    Json(req): Json<KeyboardControlRequest>,
) -> Result<impl IntoResponse, ClockError> {
    let tournament = state
        .service
        .keypress(super::tournament_id(req.tournament_id)?, req.event, req.shift)
        .await?;
    Ok(Json(tournament))
}

/// `POST /api/tournament-listen`: Wait for a newer version.
///
/// # Errors
///
/// Returns [`ClockError::ListenTimeout`] (504), [`ClockError::Deleted`]
/// (410) or [`ClockError::TournamentNotFound`] (404).
#[utoipa::path(
    post,
    path = "/api/tournament-listen",
    tag = "Control",
    summary = "Long-poll for changes",
    description = "Answers as soon as the stored version differs from the one the viewer holds. A viewer on another protocol version is answered at once.",
    request_body = ListenRequest,
    responses(
        (status = 200, description = "Newer tournament", body = serde_json::Value),
        (status = 404, description = "Tournament not found", body = ErrorResponse),
        (status = 410, description = "Tournament deleted", body = ErrorResponse),
        (status = 504, description = "Nothing changed in time", body = ErrorResponse),
    )
)]
pub async fn tournament_listen(
    State(state): State<AppState>,
    Json(req): Json<ListenRequest>,
) -> Result<impl IntoResponse, ClockError> {
    let tournament = state
        .service
        .listen(
            super::tournament_id(req.tournament_id)?,
            req.version,
            req.protocol_version,
            state.listen_timeout,
        )
        .await?;
    Ok(Json(tournament))
}

/// Control routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/keyboard-control", post(keyboard_control))
        .route("/api/tournament-listen", post(tournament_listen))
}
