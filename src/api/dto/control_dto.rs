//! Request bodies of the viewer and controller endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::KeyboardEvent;

/// `POST /api/keyboard-control` body, in the field casing controller
/// pages send.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct KeyboardControlRequest {
    /// Tournament to control.
    #[serde(rename = "TournamentID")]
    pub tournament_id: i64,
    /// Key that was pressed.
    pub event: KeyboardEvent,
    /// Whether shift was held.
    #[serde(default)]
    pub shift: bool,
}

/// `POST /api/tournament-listen` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListenRequest {
    /// Tournament to watch.
    pub tournament_id: i64,
    /// Version the viewer already shows.
    #[serde(default)]
    pub version: i64,
    /// Protocol version the viewer speaks.
    pub protocol_version: i64,
}
