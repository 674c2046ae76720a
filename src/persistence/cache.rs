//! Read-through tournament cache with version-aware invalidation.
//!
//! [`CachingStore`] sits in front of another [`TournamentStore`] and keeps
//! the most recently used tournaments in an insertion-ordered map: a hit
//! moves the entry to the back, and inserting into a full cache evicts the
//! front. An entry is only ever replaced by a strictly newer version.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;

use super::store::{StoreFuture, TournamentStore};
use crate::domain::{
    Structure, StructureId, StructureSlug, Tournament, TournamentId, TournamentSlug,
};

/// LRU entries keyed by tournament id.
struct Lru {
    capacity: usize,
    entries: IndexMap<TournamentId, Tournament>,
}

impl Lru {
    fn get(&mut self, id: TournamentId) -> Option<Tournament> {
        let index = self.entries.get_index_of(&id)?;
        let last = self.entries.len().saturating_sub(1);
        self.entries.move_index(index, last);
        self.entries.get(&id).cloned()
    }

    fn store(&mut self, tournament: Tournament) {
        if self.capacity == 0 {
            return;
        }
        if let Some(cached) = self.entries.get(&tournament.id) {
            if cached.version >= tournament.version {
                tracing::debug!(
                    tournament_id = %tournament.id,
                    cached = cached.version,
                    incoming = tournament.version,
                    "cache already current, ignoring"
                );
                return;
            }
            self.entries.shift_remove(&tournament.id);
        }
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(tournament.id, tournament);
    }
}

/// Caching decorator over a [`TournamentStore`].
///
/// Only tournaments are cached; structures and listings pass straight
/// through.
#[derive(Clone)]
pub struct CachingStore {
    inner: Arc<dyn TournamentStore>,
    lru: Arc<Mutex<Lru>>,
}

impl fmt::Debug for CachingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingStore")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl CachingStore {
    /// Wraps `inner` with a cache of up to `capacity` tournaments.
    /// A capacity of zero disables caching.
    #[must_use]
    pub fn new(inner: Arc<dyn TournamentStore>, capacity: usize) -> Self {
        Self {
            inner,
            lru: Arc::new(Mutex::new(Lru {
                capacity,
                entries: IndexMap::with_capacity(capacity),
            })),
        }
    }

    /// Drops the cached copy of `id` if it is not newer than `version`.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn invalidate(&self, id: TournamentId, version: i64) -> bool {
        let mut lru = self.lru.lock().await;
        let stale = lru
            .entries
            .get(&id)
            .is_some_and(|cached| cached.version <= version);
        if stale {
            lru.entries.shift_remove(&id);
            tracing::debug!(tournament_id = %id, version, "cache entry invalidated");
        }
        stale
    }

    /// Returns the number of cached tournaments.
    pub async fn len(&self) -> usize {
        self.lru.lock().await.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl TournamentStore for CachingStore {
    fn fetch_tournament(&self, id: TournamentId) -> StoreFuture<Tournament> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(hit) = store.lru.lock().await.get(id) {
                return Ok(hit);
            }
            let fetched = store.inner.fetch_tournament(id).await?;
            store.lru.lock().await.store(fetched.clone());
            Ok(fetched)
        })
    }

    fn save_tournament(&self, tournament: Tournament) -> StoreFuture<i64> {
        let store = self.clone();
        Box::pin(async move {
            let mut saved = tournament.clone();
            let version = store.inner.save_tournament(tournament).await?;
            saved.version = version;
            saved.transients = None;
            store.lru.lock().await.store(saved);
            Ok(version)
        })
    }

    fn create_tournament(&self, tournament: Tournament) -> StoreFuture<TournamentId> {
        self.inner.create_tournament(tournament)
    }

    fn delete_tournament(&self, id: TournamentId) -> StoreFuture<()> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.delete_tournament(id).await?;
            store.lru.lock().await.entries.shift_remove(&id);
            Ok(())
        })
    }

    fn list_tournaments(&self, offset: i64, limit: i64) -> StoreFuture<Vec<TournamentSlug>> {
        self.inner.list_tournaments(offset, limit)
    }

    fn fetch_structure(&self, id: StructureId) -> StoreFuture<Structure> {
        self.inner.fetch_structure(id)
    }

    fn create_structure(&self, structure: Structure) -> StoreFuture<StructureId> {
        self.inner.create_structure(structure)
    }

    fn list_structures(&self) -> StoreFuture<Vec<StructureSlug>> {
        self.inner.list_structures()
    }
}
