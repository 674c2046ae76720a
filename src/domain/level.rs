//! Levels and the structures that order them.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::StructureId;

/// One timed segment of a tournament: a blind level or a break.
///
/// Levels are immutable once attached to a structure; only the running
/// tournament's use of the active level changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Level {
    /// Short heading, e.g. `"LEVEL 3"`.
    #[serde(default)]
    pub banner: String,
    /// Display text, e.g. `"10-15 + 15 ANTE"`.
    pub description: String,
    /// Nominal length of the level in minutes.
    pub duration_minutes: u32,
    /// Breaks only affect the next-break computation, never the timing.
    #[serde(default)]
    pub is_break: bool,
}

impl Level {
    /// Returns the nominal length of the level.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.duration_minutes))
    }
}

/// An ordered sequence of levels plus chip constants, shared by any number
/// of tournaments through their `structure_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Structure {
    /// Storage key; zero until the structure has been created.
    #[schema(value_type = i64)]
    pub id: StructureId,
    /// Human-readable name.
    pub name: String,
    /// Row version of the structure itself.
    #[serde(default)]
    pub version: i64,
    /// Levels in play order.
    pub levels: Vec<Level>,
    /// Chips issued for each buy-in.
    pub chips_per_buy_in: i64,
    /// Chips issued for each add-on.
    #[serde(default)]
    pub chips_per_add_on: i64,
}

impl Structure {
    /// Returns the level at `index`, if any.
    #[must_use]
    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    /// Returns the index of the last level, or `None` for an empty structure.
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }
}

/// Lightweight structure listing entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StructureSlug {
    /// Structure identifier.
    #[schema(value_type = i64)]
    pub id: StructureId,
    /// Structure name.
    pub name: String,
}
