//! The tournament aggregate: identity, joined structure, mutable state and
//! derived transients.
//!
//! Accessors here are pure. Anything that changes [`TournamentState`] lives
//! in [`super::Mutator`].

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::clock::ClockState;
use super::level::{Level, Structure};
use super::{StructureId, TournamentId};

/// Client/server protocol version.
///
/// A viewer holding a different number than the server reports must reload
/// its assets; the listen endpoint forces an immediate refresh for it.
pub const PROTOCOL_VERSION: i64 = 13;

/// A tournament as seen by the clock core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    /// Storage key.
    pub id: TournamentId,
    /// Optimistic-lock counter, incremented once per committed save.
    pub version: i64,
    /// Display name.
    pub name: String,
    /// Unique human-chosen key.
    pub handle: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Structure the levels were joined from.
    pub structure_id: StructureId,
    /// Joined structure; not part of the stored document.
    pub structure: Structure,
    /// Amount added to the prize pool per buy-in.
    #[serde(default)]
    pub prize_pool_per_buy_in: i64,
    /// Amount added to the prize pool per add-on.
    #[serde(default)]
    pub prize_pool_per_add_on: i64,
    /// Paytable used when the prize pool text is computed.
    #[serde(default)]
    pub paytable_id: i64,
    /// Sound played when a level ends.
    #[serde(default)]
    pub next_level_sound_id: Option<i64>,
    /// Mutable state.
    pub state: TournamentState,
    /// Derived values; recomputed on every load and mutation.
    #[serde(default)]
    pub transients: Option<Transients>,
}

/// The part of a tournament that changes while it is played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentState {
    /// Index of the active level.
    pub current_level_number: usize,
    /// Running or paused timing of the active level.
    pub clock: ClockState,
    /// Players still in the event.
    pub current_players: i64,
    /// Buy-ins sold.
    pub buy_ins: i64,
    /// Add-ons sold.
    pub add_ons: i64,
    /// Number of saves paid out below the paytable.
    pub saves: i64,
    /// Amount paid for each save.
    pub amount_per_save: i64,
    /// Replaces the computed chip total when positive.
    pub total_chips_override: i64,
    /// Replaces the computed prize pool when positive.
    pub total_prize_pool_override: i64,
    /// Regenerate [`Self::prize_pool`] from the paytable on every change.
    pub auto_compute_prize_pool: bool,
    /// Right-hand display text, usually the payouts.
    pub prize_pool: String,
    /// Suppress the end-of-level sound.
    pub sound_muted: bool,
}

impl TournamentState {
    /// State of a freshly created tournament: paused at the first level with
    /// `remaining` on the clock and every count at zero.
    #[must_use]
    pub fn new(remaining: TimeDelta) -> Self {
        Self {
            current_level_number: 0,
            clock: ClockState::Paused { remaining },
            current_players: 0,
            buy_ins: 0,
            add_ons: 0,
            saves: 0,
            amount_per_save: 0,
            total_chips_override: 0,
            total_prize_pool_override: 0,
            auto_compute_prize_pool: false,
            prize_pool: String::new(),
            sound_muted: false,
        }
    }

    /// Returns `true` when the clock is running.
    #[must_use]
    pub const fn is_clock_running(&self) -> bool {
        self.clock.is_running()
    }
}

/// Values computed from state and structure, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Transients {
    /// Protocol version the server speaks.
    pub protocol_version: i64,
    /// Chips in play.
    pub total_chips: i64,
    /// `round(total_chips / current_players)`, zero with no players.
    pub average_chips: i64,
    /// Asset path of the end-of-level sound.
    pub next_level_sound_path: Option<String>,
    /// Index of the next break after the current level.
    pub next_break_level: Option<usize>,
}

/// Describes a single event for the tournament list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TournamentSlug {
    /// Tournament identifier.
    #[schema(value_type = i64)]
    pub id: TournamentId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

impl Tournament {
    /// Returns the level at `current_level_number`, clamped into the
    /// structure. `None` only when the structure has no levels.
    #[must_use]
    pub fn active_level(&self) -> Option<&Level> {
        let last = self.structure.last_index()?;
        self.structure
            .level(self.state.current_level_number.min(last))
    }

    /// Returns the full duration of the active level.
    #[must_use]
    pub fn active_level_duration(&self) -> Option<TimeDelta> {
        self.active_level().map(Level::duration)
    }

    /// Returns the instant the active level ends, when running.
    #[must_use]
    pub const fn current_level_ends_at(&self) -> Option<DateTime<Utc>> {
        self.state.clock.ends_at()
    }

    /// Returns the time left in the active level as of `now`.
    #[must_use]
    pub fn time_remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        self.state.clock.remaining(now)
    }

    /// Returns the index of the next break strictly after the current level.
    #[must_use]
    pub fn next_break_level(&self) -> Option<usize> {
        let start = self.state.current_level_number.saturating_add(1);
        self.structure
            .levels
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(index, level)| level.is_break.then_some(index))
    }

    /// Returns `true` if the tournament sits at the last level, paused, with
    /// nothing left on the clock.
    #[must_use]
    pub fn is_end_of_time(&self) -> bool {
        self.structure.last_index() == Some(self.state.current_level_number)
            && self.state.clock.paused_remaining() == Some(TimeDelta::zero())
    }

    /// Chips in play: the override when set, otherwise buy-ins and add-ons
    /// multiplied by the structure's chip constants.
    #[must_use]
    pub fn total_chips(&self) -> i64 {
        if self.state.total_chips_override > 0 {
            return self.state.total_chips_override;
        }
        self.state
            .buy_ins
            .saturating_mul(self.structure.chips_per_buy_in)
            .saturating_add(self.state.add_ons.saturating_mul(self.structure.chips_per_add_on))
    }

    /// Prize pool before saves: the override when set, otherwise the buy-in
    /// and add-on contributions.
    #[must_use]
    pub fn total_prize_pool(&self) -> i64 {
        if self.state.total_prize_pool_override > 0 {
            return self.state.total_prize_pool_override;
        }
        self.prize_pool_per_buy_in
            .saturating_mul(self.state.buy_ins)
            .saturating_add(self.prize_pool_per_add_on.saturating_mul(self.state.add_ons))
    }

    /// Prize pool left for the paytable once saves are paid.
    #[must_use]
    pub fn prize_pool_less_saves(&self) -> i64 {
        self.total_prize_pool()
            .saturating_sub(self.state.amount_per_save.saturating_mul(self.state.saves))
    }
}
