//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::service::TournamentService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Tournament service for all business logic.
    pub service: Arc<TournamentService>,
    /// How long a long-poll waits before answering 504.
    pub listen_timeout: Duration,
}
