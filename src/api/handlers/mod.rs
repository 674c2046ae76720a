//! REST endpoint handlers organized by resource.

pub mod control;
#[cfg(feature = "swagger-ui")]
pub mod docs;
pub mod structures;
pub mod system;
pub mod tournaments;

use axum::Router;

use crate::app_state::AppState;
use crate::domain::TournamentId;
use crate::error::ClockError;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(tournaments::routes())
        .merge(structures::routes())
}

/// Parses a tournament id from a path or body, rejecting non-positive ids.
fn tournament_id(raw: i64) -> Result<TournamentId, ClockError> {
    let id = TournamentId::new(raw);
    if id.is_valid() {
        Ok(id)
    } else {
        Err(ClockError::InvalidRequest(format!(
            "invalid tournament id {raw}"
        )))
    }
}
