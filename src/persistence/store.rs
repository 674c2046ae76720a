//! The versioned storage contract shared by every backend and decorator.

use std::fmt;

use chrono::TimeDelta;
use futures_util::future::BoxFuture;

use crate::domain::{
    ClockState, Structure, StructureId, StructureSlug, Tournament, TournamentId, TournamentSlug,
};
use crate::error::ClockError;

/// Future returned by every [`TournamentStore`] method.
pub type StoreFuture<T> = BoxFuture<'static, Result<T, ClockError>>;

/// Durable storage with optimistic concurrency on tournaments.
///
/// Implementations are cheap to clone into the returned futures, so the
/// trait stays object safe and callers can hold an `Arc<dyn TournamentStore>`.
pub trait TournamentStore: Send + Sync + fmt::Debug {
    /// Returns the latest committed tournament with its structure joined.
    ///
    /// Transients are not filled.
    fn fetch_tournament(&self, id: TournamentId) -> StoreFuture<Tournament>;

    /// Stores `tournament` if `tournament.version` is still the stored
    /// version, and returns the new version (one higher).
    ///
    /// Fails with [`ClockError::VersionConflict`] when another writer got
    /// there first and [`ClockError::TournamentNotFound`] for an unknown id.
    fn save_tournament(&self, tournament: Tournament) -> StoreFuture<i64>;

    /// Inserts a new tournament at version zero, see [`prepare_new`].
    fn create_tournament(&self, tournament: Tournament) -> StoreFuture<TournamentId>;

    /// Removes a tournament.
    fn delete_tournament(&self, id: TournamentId) -> StoreFuture<()>;

    /// Lists tournaments ordered by id.
    fn list_tournaments(&self, offset: i64, limit: i64) -> StoreFuture<Vec<TournamentSlug>>;

    /// Returns a structure by id.
    fn fetch_structure(&self, id: StructureId) -> StoreFuture<Structure>;

    /// Inserts a structure and returns its id.
    fn create_structure(&self, structure: Structure) -> StoreFuture<StructureId>;

    /// Lists structures ordered by id.
    fn list_structures(&self) -> StoreFuture<Vec<StructureSlug>>;
}

/// Normalizes a tournament for insertion: counts zeroed, clock paused with
/// the full duration of its level, transients dropped.
#[must_use]
pub fn prepare_new(tournament: &Tournament) -> Tournament {
    let mut fresh = tournament.clone();
    fresh.version = 0;
    fresh.transients = None;
    if let Some(last) = fresh.structure.last_index() {
        fresh.state.current_level_number = fresh.state.current_level_number.min(last);
    }
    let remaining = fresh
        .active_level_duration()
        .unwrap_or_else(TimeDelta::zero);
    fresh.state.clock = ClockState::Paused { remaining };
    fresh.state.current_players = 0;
    fresh.state.buy_ins = 0;
    fresh.state.add_ons = 0;
    fresh
}

/// Validates list paging arguments.
///
/// # Errors
///
/// Returns [`ClockError::InvalidRequest`] for a negative offset or a
/// non-positive limit.
pub fn check_paging(offset: i64, limit: i64) -> Result<(), ClockError> {
    if offset < 0 || limit <= 0 {
        return Err(ClockError::InvalidRequest(format!(
            "invalid paging offset={offset} limit={limit}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tournament::fixtures::tournament;

    #[test]
    fn prepare_new_zeroes_counts_and_pauses() {
        let mut t = tournament();
        t.version = 9;
        t.state.current_level_number = 1;
        t.state.buy_ins = 12;
        t.state.add_ons = 3;
        t.state.current_players = 10;
        t.state.saves = 1;
        t.state.clock = ClockState::Paused {
            remaining: TimeDelta::seconds(3),
        };

        let fresh = prepare_new(&t);
        assert_eq!(fresh.version, 0);
        assert_eq!(fresh.state.buy_ins, 0);
        assert_eq!(fresh.state.add_ons, 0);
        assert_eq!(fresh.state.current_players, 0);
        assert_eq!(fresh.state.saves, 1);
        assert_eq!(fresh.state.current_level_number, 1);
        assert_eq!(
            fresh.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(20))
        );
    }

    #[test]
    fn paging_is_validated() {
        assert!(check_paging(0, 10).is_ok());
        assert!(check_paging(-1, 10).is_err());
        assert!(check_paging(0, 0).is_err());
    }
}
