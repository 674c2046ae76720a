//! Store decorator that wakes waiters after local writes.

use std::sync::Arc;

use super::SubscriberRegistry;
use crate::domain::{
    Structure, StructureId, StructureSlug, Tournament, TournamentId, TournamentSlug,
};
use crate::persistence::{StoreFuture, TournamentStore};

/// Publishes every successful save and delete to the registry.
///
/// This is the in-process notification path; writes made by other server
/// instances reach the registry through the change feed instead.
#[derive(Debug, Clone)]
pub struct PublishingStore {
    inner: Arc<dyn TournamentStore>,
    registry: Arc<SubscriberRegistry>,
}

impl PublishingStore {
    /// Wraps `inner`, publishing to `registry`.
    #[must_use]
    pub fn new(inner: Arc<dyn TournamentStore>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { inner, registry }
    }
}

impl TournamentStore for PublishingStore {
    fn fetch_tournament(&self, id: TournamentId) -> StoreFuture<Tournament> {
        self.inner.fetch_tournament(id)
    }

    fn save_tournament(&self, tournament: Tournament) -> StoreFuture<i64> {
        let inner = Arc::clone(&self.inner);
        let registry = Arc::clone(&self.registry);
        Box::pin(async move {
            let mut saved = tournament.clone();
            let version = inner.save_tournament(tournament).await?;
            saved.version = version;
            registry.publish(saved).await;
            Ok(version)
        })
    }

    fn create_tournament(&self, tournament: Tournament) -> StoreFuture<TournamentId> {
        self.inner.create_tournament(tournament)
    }

    fn delete_tournament(&self, id: TournamentId) -> StoreFuture<()> {
        let inner = Arc::clone(&self.inner);
        let registry = Arc::clone(&self.registry);
        Box::pin(async move {
            inner.delete_tournament(id).await?;
            registry.publish_deleted(id).await;
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
