//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::TournamentSlug;

/// Offset paging for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Rows to skip. Defaults to 0.
    #[serde(default)]
    pub offset: i64,
    /// Rows to return (max 100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Paging echoed back in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Rows skipped.
    pub offset: i64,
    /// Rows requested.
    pub limit: i64,
    /// Rows returned.
    pub count: usize,
}

/// A page of tournaments.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TournamentListResponse {
    /// Tournaments ordered by id.
    pub data: Vec<TournamentSlug>,
    /// Paging used.
    pub pagination: PaginationMeta,
}

const fn default_limit() -> i64 {
    20
}

impl PaginationParams {
    /// Caps `limit` at 100. Out-of-range values are left for the store to
    /// reject.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.min(100),
        }
    }
}
