//! Stored document shapes for tournaments and structures.
//!
//! Rows keep their id and version in columns and the rest of the model in a
//! JSONB `model_data` document. The tournament document keeps the flat
//! timing fields older rows were written with (`is_clock_running` plus two
//! nullable timing values); [`TournamentDocument::into_tournament`] turns
//! them into a [`ClockState`] and repairs rows where they disagree.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ClockState, Level, Structure, StructureId, Tournament, TournamentId, TournamentState,
};

/// The `model_data` document of a `tournaments` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentDocument {
    /// Display name.
    pub name: String,
    /// Unique human-chosen key.
    pub handle: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Structure the tournament plays.
    pub structure_id: i64,
    /// Prize pool contribution per buy-in.
    #[serde(default)]
    pub prize_pool_per_buy_in: i64,
    /// Prize pool contribution per add-on.
    #[serde(default)]
    pub prize_pool_per_add_on: i64,
    /// Paytable for computed prize pools.
    #[serde(default)]
    pub paytable_id: i64,
    /// End-of-level sound.
    #[serde(default)]
    pub next_level_sound_id: Option<i64>,
    /// Mutable state.
    pub state: StateDocument,
}

/// Stored tournament state in its flat legacy shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    /// Index of the active level.
    pub current_level_number: i64,
    /// Whether the clock was running when saved.
    pub is_clock_running: bool,
    /// End of the current level in Unix milliseconds, when running.
    pub current_level_ends_at: Option<i64>,
    /// Milliseconds left in the level, when paused.
    pub time_remaining_millis: Option<i64>,
    /// Players still in.
    pub current_players: i64,
    /// Buy-ins sold.
    pub buy_ins: i64,
    /// Add-ons sold.
    pub add_ons: i64,
    /// Saves paid.
    pub saves: i64,
    /// Amount per save.
    pub amount_per_save: i64,
    /// Chip total override.
    pub total_chips_override: i64,
    /// Prize pool override.
    pub total_prize_pool_override: i64,
    /// Regenerate the prize pool text on change.
    pub auto_compute_prize_pool: bool,
    /// Prize pool text.
    pub prize_pool: String,
    /// End-of-level sound suppressed.
    pub sound_muted: bool,
}

impl TournamentDocument {
    /// Builds the stored document for `tournament`, leaving out the
    /// joined structure and transients.
    #[must_use]
    pub fn from_tournament(tournament: &Tournament) -> Self {
        let state = &tournament.state;
        let (current_level_ends_at, time_remaining_millis) = match state.clock {
            ClockState::Running { ends_at } => (Some(ends_at.timestamp_millis()), None),
            ClockState::Paused { remaining } => (None, Some(remaining.num_milliseconds())),
        };
        Self {
            name: tournament.name.clone(),
            handle: tournament.handle.clone(),
            description: tournament.description.clone(),
            structure_id: tournament.structure_id.get(),
            prize_pool_per_buy_in: tournament.prize_pool_per_buy_in,
            prize_pool_per_add_on: tournament.prize_pool_per_add_on,
            paytable_id: tournament.paytable_id,
            next_level_sound_id: tournament.next_level_sound_id,
            state: StateDocument {
                current_level_number: i64::try_from(state.current_level_number)
                    .unwrap_or(i64::MAX),
                is_clock_running: state.is_clock_running(),
                current_level_ends_at,
                time_remaining_millis,
                current_players: state.current_players,
                buy_ins: state.buy_ins,
                add_ons: state.add_ons,
                saves: state.saves,
                amount_per_save: state.amount_per_save,
                total_chips_override: state.total_chips_override,
                total_prize_pool_override: state.total_prize_pool_override,
                auto_compute_prize_pool: state.auto_compute_prize_pool,
                prize_pool: state.prize_pool.clone(),
                sound_muted: state.sound_muted,
            },
        }
    }

    /// Rebuilds the tournament stored under `id` at `version`, joined with
    /// `structure`.
    ///
    /// Timing fields that disagree with `is_clock_running` are repaired and
    /// logged: a running row without an end instant is paused with whatever
    /// remaining time it has, and a paused row without remaining time gets
    /// the full level duration.
    #[must_use]
    pub fn into_tournament(self, id: TournamentId, version: i64, structure: Structure) -> Tournament {
        let level_number = match usize::try_from(self.state.current_level_number) {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    tournament_id = %id,
                    level = self.state.current_level_number,
                    "negative level number in stored tournament, using level 0"
                );
                0
            }
        };
        let full_level = structure
            .level(level_number.min(structure.last_index().unwrap_or(0)))
            .map_or_else(TimeDelta::zero, Level::duration);
        let clock = decode_clock(id, &self.state, full_level);

        let doc = self.state;
        Tournament {
            id,
            version,
            name: self.name,
            handle: self.handle,
            description: self.description,
            structure_id: StructureId::new(self.structure_id),
            structure,
            prize_pool_per_buy_in: self.prize_pool_per_buy_in,
            prize_pool_per_add_on: self.prize_pool_per_add_on,
            paytable_id: self.paytable_id,
            next_level_sound_id: self.next_level_sound_id,
            state: TournamentState {
                current_level_number: level_number,
                clock,
                current_players: doc.current_players,
                buy_ins: doc.buy_ins,
                add_ons: doc.add_ons,
                saves: doc.saves,
                amount_per_save: doc.amount_per_save,
                total_chips_override: doc.total_chips_override,
                total_prize_pool_override: doc.total_prize_pool_override,
                auto_compute_prize_pool: doc.auto_compute_prize_pool,
                prize_pool: doc.prize_pool,
                sound_muted: doc.sound_muted,
            },
            transients: None,
        }
    }
}

fn decode_clock(id: TournamentId, doc: &StateDocument, full_level: TimeDelta) -> ClockState {
    let ends_at = doc
        .current_level_ends_at
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    let remaining = doc.time_remaining_millis.map(TimeDelta::milliseconds);

    match (doc.is_clock_running, ends_at, remaining) {
        (true, Some(ends_at), _) => ClockState::Running { ends_at },
        (true, None, remaining) => {
            tracing::warn!(tournament_id = %id, "running tournament has no end instant, pausing");
            ClockState::Paused {
                remaining: remaining.unwrap_or(full_level),
            }
        }
        (false, _, Some(remaining)) => ClockState::Paused { remaining },
        (false, _, None) => {
            tracing::warn!(tournament_id = %id, "paused tournament has no remaining time, using full level");
            ClockState::Paused {
                remaining: full_level,
            }
        }
    }
}

/// The `model_data` document of a `structures` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDocument {
    /// Levels in play order.
    pub levels: Vec<Level>,
    /// Chips per buy-in.
    pub chips_per_buy_in: i64,
    /// Chips per add-on.
    #[serde(default)]
    pub chips_per_add_on: i64,
}

impl StructureDocument {
    /// Builds the stored document for `structure`.
    #[must_use]
    pub fn from_structure(structure: &Structure) -> Self {
        Self {
            levels: structure.levels.clone(),
            chips_per_buy_in: structure.chips_per_buy_in,
            chips_per_add_on: structure.chips_per_add_on,
        }
    }

    /// Rebuilds the structure stored under `id`.
    #[must_use]
    pub fn into_structure(self, id: StructureId, name: String, version: i64) -> Structure {
        Structure {
            id,
            name,
            version,
            levels: self.levels,
            chips_per_buy_in: self.chips_per_buy_in,
            chips_per_add_on: self.chips_per_add_on,
        }
    }
}
