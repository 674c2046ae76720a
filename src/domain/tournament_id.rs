//! Type-safe row identifiers.
//!
//! [`TournamentId`] and [`StructureId`] are newtype wrappers around the
//! `BIGSERIAL` keys assigned by storage, so that a tournament id cannot be
//! passed where a structure id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a tournament.
///
/// Assigned by the store on creation and immutable thereafter. Used as the
/// key of the subscriber registry and carried by change-feed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TournamentId(i64);

impl TournamentId {
    /// Wraps a raw storage key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw storage key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns `true` if the id could have been assigned by storage.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for TournamentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TournamentId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<TournamentId> for i64 {
    fn from(id: TournamentId) -> Self {
        id.0
    }
}

/// Unique identifier for a level structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureId(i64);

impl StructureId {
    /// Wraps a raw storage key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw storage key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StructureId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}
