//! Tournament service: load, mutate, save, and long-poll.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{
    KeyboardEvent, Level, Mutation, Mutator, PROTOCOL_VERSION, Structure, StructureId,
    StructureSlug, Tournament, TournamentId, TournamentSlug, TournamentState,
};
use crate::error::ClockError;
use crate::notify::SubscriberRegistry;
use crate::persistence::TournamentStore;

/// The caller-chosen part of a new tournament.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TournamentDraft {
    /// Display name.
    pub name: String,
    /// Unique key.
    pub handle: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Structure to play.
    pub structure_id: i64,
    /// Prize pool contribution per buy-in.
    #[serde(default)]
    pub prize_pool_per_buy_in: i64,
    /// Prize pool contribution per add-on.
    #[serde(default)]
    pub prize_pool_per_add_on: i64,
    /// Paytable for the computed prize pool text.
    #[serde(default)]
    pub paytable_id: i64,
    /// End-of-level sound.
    #[serde(default)]
    pub next_level_sound_id: Option<i64>,
    /// Regenerate the prize pool text on every change.
    #[serde(default)]
    pub auto_compute_prize_pool: bool,
}

/// The caller-chosen part of a new structure.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StructureDraft {
    /// Display name.
    pub name: String,
    /// Levels in play order.
    pub levels: Vec<Level>,
    /// Chips per buy-in.
    pub chips_per_buy_in: i64,
    /// Chips per add-on.
    #[serde(default)]
    pub chips_per_add_on: i64,
}

/// Orchestrates every tournament operation.
///
/// Mutations follow one pattern: fetch the current copy, apply a single
/// [`Mutation`], save once with the version that was read. A concurrent
/// writer turns the save into [`ClockError::VersionConflict`] and nothing
/// is retried.
#[derive(Debug, Clone)]
pub struct TournamentService {
    store: Arc<dyn TournamentStore>,
    registry: Arc<SubscriberRegistry>,
    mutator: Mutator,
}

impl TournamentService {
    /// Creates a service over `store`; `registry` serves long-polls.
    #[must_use]
    pub fn new(
        store: Arc<dyn TournamentStore>,
        registry: Arc<SubscriberRegistry>,
        mutator: Mutator,
    ) -> Self {
        Self {
            store,
            registry,
            mutator,
        }
    }

    /// Loads a tournament with its transients filled.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TournamentNotFound`] for an unknown id and
    /// propagates storage failures.
    pub async fn fetch_tournament(&self, id: TournamentId) -> Result<Tournament, ClockError> {
        let mut tournament = self.store.fetch_tournament(id).await?;
        self.mutator.fill_transients(&mut tournament);
        Ok(tournament)
    }

    /// Applies `mutation` to tournament `id` and saves the result.
    ///
    /// # Errors
    ///
    /// Returns the mutator's error unchanged (nothing is saved), or
    /// [`ClockError::VersionConflict`] if another writer saved first.
    pub async fn apply(
        &self,
        id: TournamentId,
        mutation: Mutation,
    ) -> Result<Tournament, ClockError> {
        let mut tournament = self.store.fetch_tournament(id).await?;
        let read_version = tournament.version;
        self.mutator.apply(&mut tournament, mutation)?;
        let version = self.store.save_tournament(tournament.clone()).await?;
        tournament.version = version;
        tracing::info!(tournament_id = %id, ?mutation, from = read_version, to = version, "applied mutation");
        Ok(tournament)
    }

    /// Applies the mutation bound to a keyboard shortcut.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn keypress(
        &self,
        id: TournamentId,
        event: KeyboardEvent,
        shift: bool,
    ) -> Result<Tournament, ClockError> {
        self.apply(id, Mutation::from_keypress(event, shift)).await
    }

    /// Creates a tournament from `draft` and returns the stored copy.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] for a blank name or handle or
    /// a handle in use, and [`ClockError::StructureNotFound`] for an unknown
    /// structure.
    pub async fn create_tournament(
        &self,
        draft: TournamentDraft,
    ) -> Result<Tournament, ClockError> {
        if draft.name.trim().is_empty() {
            return Err(ClockError::InvalidRequest("name must not be empty".to_string()));
        }
        if draft.handle.trim().is_empty() {
            return Err(ClockError::InvalidRequest(
                "handle must not be empty".to_string(),
            ));
        }
        let structure = self
            .store
            .fetch_structure(StructureId::new(draft.structure_id))
            .await?;
        let remaining = structure
            .levels
            .first()
            .map_or_else(chrono::TimeDelta::zero, Level::duration);

        let mut state = TournamentState::new(remaining);
        state.auto_compute_prize_pool = draft.auto_compute_prize_pool;
        let tournament = Tournament {
            id: TournamentId::new(0),
            version: 0,
            name: draft.name,
            handle: draft.handle,
            description: draft.description,
            structure_id: structure.id,
            structure,
            prize_pool_per_buy_in: draft.prize_pool_per_buy_in,
            prize_pool_per_add_on: draft.prize_pool_per_add_on,
            paytable_id: draft.paytable_id,
            next_level_sound_id: draft.next_level_sound_id,
            state,
            transients: None,
        };
        let id = self.store.create_tournament(tournament).await?;
        self.fetch_tournament(id).await
    }

    /// Deletes a tournament; parked viewers are told it is gone.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TournamentNotFound`] for an unknown id.
    pub async fn delete_tournament(&self, id: TournamentId) -> Result<(), ClockError> {
        self.store.delete_tournament(id).await
    }

    /// Lists tournaments by id.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] for a negative offset or a
    /// limit that is not positive.
    pub async fn list_tournaments(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TournamentSlug>, ClockError> {
        self.store.list_tournaments(offset, limit).await
    }

    /// Creates a structure and returns the stored copy.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] for a blank name, no levels,
    /// or a zero-length level.
    pub async fn create_structure(&self, draft: StructureDraft) -> Result<Structure, ClockError> {
        if draft.name.trim().is_empty() {
            return Err(ClockError::InvalidRequest("name must not be empty".to_string()));
        }
        if draft.levels.is_empty() {
            return Err(ClockError::InvalidRequest(
                "a structure needs at least one level".to_string(),
            ));
        }
        if let Some(index) = draft.levels.iter().position(|l| l.duration_minutes == 0) {
            return Err(ClockError::InvalidRequest(format!(
                "level {index} has no duration"
            )));
        }
        let id = self
            .store
            .create_structure(Structure {
                id: StructureId::new(0),
                name: draft.name,
                version: 0,
                levels: draft.levels,
                chips_per_buy_in: draft.chips_per_buy_in,
                chips_per_add_on: draft.chips_per_add_on,
            })
            .await?;
        self.store.fetch_structure(id).await
    }

    /// Loads a structure.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::StructureNotFound`] for an unknown id.
    pub async fn fetch_structure(&self, id: StructureId) -> Result<Structure, ClockError> {
        self.store.fetch_structure(id).await
    }

    /// Lists structures by id.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn list_structures(&self) -> Result<Vec<StructureSlug>, ClockError> {
        self.store.list_structures().await
    }

    /// Waits up to `timeout` for a version of `id` other than
    /// `known_version`.
    ///
    /// A viewer speaking another protocol version is answered at once.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ListenTimeout`], [`ClockError::Deleted`] or
    /// [`ClockError::TournamentNotFound`].
    pub async fn listen(
        &self,
        id: TournamentId,
        known_version: i64,
        protocol_version: i64,
        timeout: Duration,
    ) -> Result<Tournament, ClockError> {
        let known_version = if protocol_version == PROTOCOL_VERSION {
            known_version
        } else {
            tracing::debug!(
                tournament_id = %id,
                client = protocol_version,
                server = PROTOCOL_VERSION,
                "protocol mismatch, forcing refresh"
            );
            -1
        };
        self.registry
            .subscribe(id, known_version)
            .await?
            .wait(timeout)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};

    use super::*;
    use crate::domain::tournament::fixtures::structure;
    use crate::domain::{BuiltinPaytables, BuiltinSounds, ManualClock};
    use crate::notify::PublishingStore;
    use crate::persistence::MemoryStore;

    pub(crate) fn draft(structure_id: StructureId) -> TournamentDraft {
        TournamentDraft {
            name: "Friday Game".to_string(),
            handle: "friday".to_string(),
            description: String::new(),
            structure_id: structure_id.get(),
            prize_pool_per_buy_in: 40,
            prize_pool_per_add_on: 20,
            paytable_id: 1,
            next_level_sound_id: Some(1),
            auto_compute_prize_pool: false,
        }
    }

    /// A service over a fresh in-memory store holding the fixture structure.
    pub(crate) async fn service_with_clock() -> (TournamentService, Arc<ManualClock>, StructureId) {
        let Some(start) = Utc.with_ymd_and_hms(2024, 3, 1, 19, 0, 0).single() else {
            panic!("valid start");
        };
        let clock = Arc::new(ManualClock::new(start));
        let mutator = Mutator::new(
            Arc::clone(&clock) as Arc<dyn crate::domain::Clock>,
            Arc::new(BuiltinPaytables::new()),
            Arc::new(BuiltinSounds::new()),
        );
        let backing: Arc<dyn TournamentStore> = Arc::new(MemoryStore::new());
        let Ok(structure_id) = backing.create_structure(structure()).await else {
            panic!("structure");
        };
        let registry = Arc::new(SubscriberRegistry::new(
            Arc::clone(&backing),
            mutator.clone(),
        ));
        let store = Arc::new(PublishingStore::new(backing, Arc::clone(&registry)));
        (
            TournamentService::new(store, registry, mutator),
            clock,
            structure_id,
        )
    }

    #[tokio::test]
    async fn create_pauses_at_first_level() {
        let (service, _, structure_id) = service_with_clock().await;
        let Ok(t) = service.create_tournament(draft(structure_id)).await else {
            panic!("create");
        };
        assert_eq!(t.version, 0);
        assert_eq!(t.state.current_level_number, 0);
        assert!(!t.state.is_clock_running());
        assert_eq!(t.state.clock.paused_remaining(), Some(TimeDelta::minutes(15)));
        assert!(t.transients.is_some());
    }

    #[tokio::test]
    async fn create_rejects_unknown_structure_and_blank_handle() {
        let (service, _, _) = service_with_clock().await;
        assert!(matches!(
            service.create_tournament(draft(StructureId::new(99))).await,
            Err(ClockError::StructureNotFound(_))
        ));
        let mut blank = draft(StructureId::new(1));
        blank.handle = "  ".to_string();
        assert!(matches!(
            service.create_tournament(blank).await,
            Err(ClockError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn apply_saves_once_per_mutation() {
        let (service, clock, structure_id) = service_with_clock().await;
        let Ok(t) = service.create_tournament(draft(structure_id)).await else {
            panic!("create");
        };
        let Ok(started) = service.apply(t.id, Mutation::StartClock).await else {
            panic!("start");
        };
        assert_eq!(started.version, 1);
        assert!(started.state.is_clock_running());

        clock.advance(TimeDelta::seconds(901));
        let Ok(reloaded) = service.fetch_tournament(t.id).await else {
            panic!("fetch");
        };
        // Reads reconcile without saving.
        assert_eq!(reloaded.version, 1);
        assert_eq!(reloaded.state.current_level_number, 1);

        let Ok(stopped) = service.apply(t.id, Mutation::StopClock).await else {
            panic!("stop");
        };
        assert_eq!(stopped.version, 2);
        assert_eq!(stopped.state.current_level_number, 1);
    }

    #[tokio::test]
    async fn failed_mutation_saves_nothing() {
        let (service, _, structure_id) = service_with_clock().await;
        let Ok(t) = service.create_tournament(draft(structure_id)).await else {
            panic!("create");
        };
        assert!(matches!(
            service.apply(t.id, Mutation::PreviousLevel).await,
            Err(ClockError::LevelOutOfRange { .. })
        ));
        let Ok(reloaded) = service.fetch_tournament(t.id).await else {
            panic!("fetch");
        };
        assert_eq!(reloaded.version, 0);
    }

    #[tokio::test]
    async fn shifted_keypress_adds_ten_players() {
        let (service, _, structure_id) = service_with_clock().await;
        let Ok(t) = service.create_tournament(draft(structure_id)).await else {
            panic!("create");
        };
        let Ok(t) = service.keypress(t.id, KeyboardEvent::AddPlayer, true).await else {
            panic!("keypress");
        };
        assert_eq!(t.state.current_players, 10);
    }

    #[tokio::test]
    async fn listen_is_woken_by_apply() {
        let (service, _, structure_id) = service_with_clock().await;
        let Ok(t) = service.create_tournament(draft(structure_id)).await else {
            panic!("create");
        };
        let listener = service.clone();
        let id = t.id;
        let waiting = tokio::spawn(async move {
            listener
                .listen(id, 0, PROTOCOL_VERSION, Duration::from_secs(5))
                .await
        });
        while service.registry.waiter_count(id).await == 0 {
            tokio::task::yield_now().await;
        }
        let Ok(_) = service.apply(id, Mutation::ChangeBuyIns { delta: 2 }).await else {
            panic!("apply");
        };
        let Ok(Ok(got)) = waiting.await else {
            panic!("listen");
        };
        assert_eq!(got.version, 1);
        assert_eq!(got.state.buy_ins, 2);
    }

    #[tokio::test]
    async fn protocol_mismatch_answers_immediately() {
        let (service, _, structure_id) = service_with_clock().await;
        let Ok(t) = service.create_tournament(draft(structure_id)).await else {
            panic!("create");
        };
        let Ok(got) = service
            .listen(t.id, 0, PROTOCOL_VERSION - 1, Duration::from_millis(10))
            .await
        else {
            panic!("immediate answer");
        };
        assert_eq!(got.version, 0);
    }

    #[tokio::test]
    async fn structure_validation() {
        let (service, _, _) = service_with_clock().await;
        let empty = StructureDraft {
            name: "Turbo".to_string(),
            levels: Vec::new(),
            chips_per_buy_in: 1000,
            chips_per_add_on: 0,
        };
        assert!(matches!(
            service.create_structure(empty).await,
            Err(ClockError::InvalidRequest(_))
        ));

        let turbo = StructureDraft {
            name: "Turbo".to_string(),
            levels: structure().levels,
            chips_per_buy_in: 1000,
            chips_per_add_on: 0,
        };
        let Ok(created) = service.create_structure(turbo).await else {
            panic!("create structure");
        };
        assert_eq!(created.name, "Turbo");
        let Ok(listed) = service.list_structures().await else {
            panic!("list");
        };
        assert_eq!(listed.len(), 2);
    }
}
