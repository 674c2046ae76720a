//! Clock error types with HTTP status code mapping.
//!
//! [`ClockError`] is the central error type for the server. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{StructureId, TournamentId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "version conflict on tournament 7: expected version 12",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`ClockError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                        |
/// |-----------|-----------------------|------------------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request                    |
/// | 2000–2999 | State/Not Found       | 404 / 409 / 410                    |
/// | 3000–3999 | Server                | 500 / 503 / 504                    |
/// | 4000–4999 | Clock configuration   | 422 Unprocessable Entity           |
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClockError {
    /// Tournament with the given ID was not found.
    #[error("no such tournament id {0}")]
    TournamentNotFound(TournamentId),

    /// Structure with the given ID was not found.
    #[error("no such structure id {0}")]
    StructureNotFound(StructureId),

    /// The caller's version is not the stored version.
    #[error("version conflict on tournament {id}: expected version {expected}")]
    VersionConflict {
        /// Tournament whose save was rejected.
        id: TournamentId,
        /// Version the caller believed was stored.
        expected: i64,
    },

    /// The tournament was deleted while a viewer was waiting on it.
    #[error("tournament {0} has been deleted")]
    Deleted(TournamentId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The tournament's structure has no levels.
    #[error("tournament {0} has no current level")]
    NoCurrentLevel(TournamentId),

    /// A level change would leave the structure.
    #[error("level {level} is out of range for tournament {id}")]
    LevelOutOfRange {
        /// Tournament being changed.
        id: TournamentId,
        /// Requested level index.
        level: i64,
    },

    /// No change arrived before the long-poll deadline.
    #[error("timed out waiting for tournament update")]
    ListenTimeout,

    /// The change feed could not be read or decoded.
    #[error("change feed error: {0}")]
    ChangeFeed(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClockError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::TournamentNotFound(_) => 2001,
            Self::StructureNotFound(_) => 2002,
            Self::VersionConflict { .. } => 2003,
            Self::Deleted(_) => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::ChangeFeed(_) => 3002,
            Self::ListenTimeout => 3003,
            Self::NoCurrentLevel(_) => 4001,
            Self::LevelOutOfRange { .. } => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::TournamentNotFound(_) | Self::StructureNotFound(_) => StatusCode::NOT_FOUND,
            Self::VersionConflict { .. } => StatusCode::CONFLICT,
            Self::Deleted(_) => StatusCode::GONE,
            Self::NoCurrentLevel(_) | Self::LevelOutOfRange { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::ListenTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ChangeFeed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for the not-found family, which also ends long-polls.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TournamentNotFound(_) | Self::Deleted(_))
    }
}

impl From<sqlx::Error> for ClockError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<serde_json::Error> for ClockError {
    fn from(err: serde_json::Error) -> Self {
        Self::PersistenceError(format!("decoding stored document: {err}"))
    }
}

impl IntoResponse for ClockError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() && !matches!(self, Self::ListenTimeout) {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
