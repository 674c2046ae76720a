//! In-process storage backend.
//!
//! [`MemoryStore`] keeps rows in the same column-plus-document shape as the
//! PostgreSQL tables, so every save goes through the same encoding and
//! version check. It can also emit the change notifications the database
//! trigger would, which keeps the change-feed path live without a database.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use super::models::{StructureDocument, TournamentDocument};
use super::store::{StoreFuture, TournamentStore, check_paging, prepare_new};
use crate::domain::{
    Structure, StructureId, StructureSlug, Tournament, TournamentId, TournamentSlug,
};
use crate::error::ClockError;
use crate::notify::NotificationEvent;

#[derive(Debug, Clone)]
struct TournamentRow {
    handle: String,
    version: i64,
    model_data: serde_json::Value,
}

#[derive(Debug, Clone)]
struct StructureRow {
    name: String,
    version: i64,
    model_data: serde_json::Value,
}

#[derive(Debug, Default)]
struct Tables {
    tournaments: BTreeMap<i64, TournamentRow>,
    structures: BTreeMap<i64, StructureRow>,
    last_tournament_id: i64,
    last_structure_id: i64,
}

/// Storage backed by ordered maps behind a single [`RwLock`].
///
/// # Concurrency
///
/// - Reads proceed concurrently.
/// - Every write holds the write lock for the whole check-and-store, which
///   makes the version comparison atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    changes: Option<broadcast::Sender<String>>,
}

impl MemoryStore {
    /// Creates an empty store that emits no notifications.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that sends a JSON [`NotificationEvent`] on
    /// `changes` after every committed write to `tournaments` or
    /// `structures`.
    #[must_use]
    pub fn with_change_feed(changes: broadcast::Sender<String>) -> Self {
        Self {
            tables: Arc::default(),
            changes: Some(changes),
        }
    }

    fn notify(&self, table: &str, id: i64, version: i64) {
        let Some(changes) = &self.changes else {
            return;
        };
        let event = NotificationEvent {
            table: table.to_string(),
            id,
            version,
        };
        match serde_json::to_string(&event) {
            Ok(payload) => {
                // No receivers is fine: nobody is bridging the feed yet.
                let _ = changes.send(payload);
            }
            Err(e) => tracing::error!(error = %e, table, id, "encoding change notification"),
        }
    }

    async fn load_structure(&self, id: StructureId) -> Result<Structure, ClockError> {
        let tables = self.tables.read().await;
        let row = tables
            .structures
            .get(&id.get())
            .cloned()
            .ok_or(ClockError::StructureNotFound(id))?;
        drop(tables);
        let doc: StructureDocument = serde_json::from_value(row.model_data)?;
        Ok(doc.into_structure(id, row.name, row.version))
    }
}

impl TournamentStore for MemoryStore {
    fn fetch_tournament(&self, id: TournamentId) -> StoreFuture<Tournament> {
        let store = self.clone();
        Box::pin(async move {
            let row = store
                .tables
                .read()
                .await
                .tournaments
                .get(&id.get())
                .cloned()
                .ok_or(ClockError::TournamentNotFound(id))?;
            let doc: TournamentDocument = serde_json::from_value(row.model_data)?;
            let structure = store
                .load_structure(StructureId::new(doc.structure_id))
                .await?;
            Ok(doc.into_tournament(id, row.version, structure))
        })
    }

    fn save_tournament(&self, tournament: Tournament) -> StoreFuture<i64> {
        let store = self.clone();
        Box::pin(async move {
            let id = tournament.id;
            let model_data = serde_json::to_value(TournamentDocument::from_tournament(&tournament))?;

            let mut tables = store.tables.write().await;
            let row = tables
                .tournaments
                .get_mut(&id.get())
                .ok_or(ClockError::TournamentNotFound(id))?;
            if row.version != tournament.version {
                return Err(ClockError::VersionConflict {
                    id,
                    expected: tournament.version,
                });
            }
            row.version += 1;
            row.handle.clone_from(&tournament.handle);
            row.model_data = model_data;
            let version = row.version;
            drop(tables);

            tracing::debug!(tournament_id = %id, version, "saved tournament");
            store.notify("tournaments", id.get(), version);
            Ok(version)
        })
    }

    fn create_tournament(&self, tournament: Tournament) -> StoreFuture<TournamentId> {
        let store = self.clone();
        Box::pin(async move {
            let fresh = prepare_new(&tournament);
            let model_data = serde_json::to_value(TournamentDocument::from_tournament(&fresh))?;

            let mut tables = store.tables.write().await;
            if !tables.structures.contains_key(&fresh.structure_id.get()) {
                return Err(ClockError::StructureNotFound(fresh.structure_id));
            }
            if tables.tournaments.values().any(|row| row.handle == fresh.handle) {
                return Err(ClockError::InvalidRequest(format!(
                    "handle {:?} is already in use",
                    fresh.handle
                )));
            }
            tables.last_tournament_id += 1;
            let id = tables.last_tournament_id;
            tables.tournaments.insert(
                id,
                TournamentRow {
                    handle: fresh.handle.clone(),
                    version: 0,
                    model_data,
                },
            );
            drop(tables);

            tracing::info!(tournament_id = id, handle = %fresh.handle, "created tournament");
            store.notify("tournaments", id, 0);
            Ok(TournamentId::new(id))
        })
    }

    fn delete_tournament(&self, id: TournamentId) -> StoreFuture<()> {
        let store = self.clone();
        Box::pin(async move {
            let removed = store
                .tables
                .write()
                .await
                .tournaments
                .remove(&id.get())
                .ok_or(ClockError::TournamentNotFound(id))?;
            tracing::info!(tournament_id = %id, "deleted tournament");
            store.notify("tournaments", id.get(), removed.version);
            Ok(())
        })
    }

    fn list_tournaments(&self, offset: i64, limit: i64) -> StoreFuture<Vec<TournamentSlug>> {
        let store = self.clone();
        Box::pin(async move {
            check_paging(offset, limit)?;
            let rows: Vec<(i64, TournamentRow)> = store
                .tables
                .read()
                .await
                .tournaments
                .iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .map(|(id, row)| (*id, row.clone()))
                .collect();

            rows.into_iter()
                .map(|(id, row)| -> Result<TournamentSlug, ClockError> {
                    let doc: TournamentDocument = serde_json::from_value(row.model_data)?;
                    Ok(TournamentSlug {
                        id: TournamentId::new(id),
                        name: doc.name,
                        description: doc.description,
                    })
                })
                .collect()
        })
    }

    fn fetch_structure(&self, id: StructureId) -> StoreFuture<Structure> {
        let store = self.clone();
        Box::pin(async move { store.load_structure(id).await })
    }

    fn create_structure(&self, structure: Structure) -> StoreFuture<StructureId> {
        let store = self.clone();
        Box::pin(async move {
            let model_data = serde_json::to_value(StructureDocument::from_structure(&structure))?;
            let mut tables = store.tables.write().await;
            tables.last_structure_id += 1;
            let id = tables.last_structure_id;
            tables.structures.insert(
                id,
                StructureRow {
                    name: structure.name.clone(),
                    version: 0,
                    model_data,
                },
            );
            drop(tables);

            tracing::info!(structure_id = id, name = %structure.name, "created structure");
            store.notify("structures", id, 0);
            Ok(StructureId::new(id))
        })
    }

    fn list_structures(&self) -> StoreFuture<Vec<StructureSlug>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .tables
                .read()
                .await
                .structures
                .iter()
                .map(|(id, row)| StructureSlug {
                    id: StructureId::new(*id),
                    name: row.name.clone(),
                })
                .collect())
        })
    }
}
