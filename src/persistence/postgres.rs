//! PostgreSQL implementation of the tournament store.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{StructureDocument, TournamentDocument};
use super::store::{StoreFuture, TournamentStore, check_paging, prepare_new};
use crate::config::ClockConfig;
use crate::domain::{
    Structure, StructureId, StructureSlug, Tournament, TournamentId, TournamentSlug,
};
use crate::error::ClockError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// Tables and change triggers are created by the embedded migrations in
/// `migrations/`; see [`PostgresStore::migrate`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::PersistenceError`] if the database cannot be
    /// reached within the configured timeout.
    pub async fn connect(config: &ClockConfig) -> Result<Self, ClockError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), ClockError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ClockError::PersistenceError(format!("running migrations: {e}")))
    }

    async fn load_structure(&self, id: StructureId) -> Result<Structure, ClockError> {
        let row = sqlx::query_as::<_, (String, i64, serde_json::Value)>(
            "SELECT name, version, model_data FROM structures WHERE structure_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        let (name, version, model_data) = row.ok_or(ClockError::StructureNotFound(id))?;
        let doc: StructureDocument = serde_json::from_value(model_data)?;
        Ok(doc.into_structure(id, name, version))
    }
}

/// Maps a unique-constraint violation on insert to a client error.
fn map_insert_error(err: sqlx::Error, handle: &str) -> ClockError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return ClockError::InvalidRequest(format!("handle {handle:?} is already in use"));
        }
    }
    err.into()
}

impl TournamentStore for PostgresStore {
    fn fetch_tournament(&self, id: TournamentId) -> StoreFuture<Tournament> {
        let store = self.clone();
        Box::pin(async move {
            let row = sqlx::query_as::<_, (i64, serde_json::Value)>(
                "SELECT version, model_data FROM tournaments WHERE tournament_id = $1",
            )
            .bind(id.get())
            .fetch_optional(&store.pool)
            .await?;
            let (version, model_data) = row.ok_or(ClockError::TournamentNotFound(id))?;
            let doc: TournamentDocument = serde_json::from_value(model_data)?;
            let structure = store
                .load_structure(StructureId::new(doc.structure_id))
                .await?;
            Ok(doc.into_tournament(id, version, structure))
        })
    }

    fn save_tournament(&self, tournament: Tournament) -> StoreFuture<i64> {
        let store = self.clone();
        Box::pin(async move {
            let id = tournament.id;
            let expected = tournament.version;
            let doc = serde_json::to_value(TournamentDocument::from_tournament(&tournament))?;

            let result = sqlx::query(
                "UPDATE tournaments \
                 SET version = version + 1, handle = $2, structure_id = $3, model_data = $4 \
                 WHERE tournament_id = $1 AND version = $5",
            )
            .bind(id.get())
            .bind(&tournament.handle)
            .bind(tournament.structure_id.get())
            .bind(doc)
            .bind(expected)
            .execute(&store.pool)
            .await?;

            if result.rows_affected() == 1 {
                tracing::debug!(tournament_id = %id, version = expected + 1, "saved tournament");
                return Ok(expected + 1);
            }

            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT version FROM tournaments WHERE tournament_id = $1",
            )
            .bind(id.get())
            .fetch_optional(&store.pool)
            .await?;
            match exists {
                Some(stored) => {
                    tracing::info!(tournament_id = %id, expected, stored, "optimistic lock failure");
                    Err(ClockError::VersionConflict { id, expected })
                }
                None => Err(ClockError::TournamentNotFound(id)),
            }
        })
    }

    fn create_tournament(&self, tournament: Tournament) -> StoreFuture<TournamentId> {
        let store = self.clone();
        Box::pin(async move {
            let fresh = prepare_new(&tournament);
            store.load_structure(fresh.structure_id).await?;
            let doc = serde_json::to_value(TournamentDocument::from_tournament(&fresh))?;

            let id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO tournaments (handle, structure_id, model_data) \
                 VALUES ($1, $2, $3) RETURNING tournament_id",
            )
            .bind(&fresh.handle)
            .bind(fresh.structure_id.get())
            .bind(doc)
            .fetch_one(&store.pool)
            .await
            .map_err(|e| map_insert_error(e, &fresh.handle))?;

            tracing::info!(tournament_id = id, handle = %fresh.handle, "created tournament");
            Ok(TournamentId::new(id))
        })
    }

    fn delete_tournament(&self, id: TournamentId) -> StoreFuture<()> {
        let store = self.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM tournaments WHERE tournament_id = $1")
                .bind(id.get())
                .execute(&store.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(ClockError::TournamentNotFound(id));
            }
            tracing::info!(tournament_id = %id, "deleted tournament");
            Ok(())
        })
    }

    fn list_tournaments(&self, offset: i64, limit: i64) -> StoreFuture<Vec<TournamentSlug>> {
        let store = self.clone();
        Box::pin(async move {
            check_paging(offset, limit)?;
            let rows = sqlx::query_as::<_, (i64, String, String)>(
                "SELECT tournament_id, COALESCE(model_data->>'name', ''), \
                 COALESCE(model_data->>'description', '') \
                 FROM tournaments ORDER BY tournament_id OFFSET $1 LIMIT $2",
            )
            .bind(offset)
            .bind(limit)
            .fetch_all(&store.pool)
            .await?;

            Ok(rows
                .into_iter()
                .map(|(id, name, description)| TournamentSlug {
                    id: TournamentId::new(id),
                    name,
                    description,
                })
                .collect())
        })
    }

    fn fetch_structure(&self, id: StructureId) -> StoreFuture<Structure> {
        let store = self.clone();
        Box::pin(async move { store.load_structure(id).await })
    }

    fn create_structure(&self, structure: Structure) -> StoreFuture<StructureId> {
        let store = self.clone();
        Box::pin(async move {
            let doc = serde_json::to_value(StructureDocument::from_structure(&structure))?;
            let id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO structures (name, model_data) VALUES ($1, $2) RETURNING structure_id",
            )
            .bind(&structure.name)
            .bind(doc)
            .fetch_one(&store.pool)
            .await?;
            tracing::info!(structure_id = id, name = %structure.name, "created structure");
            Ok(StructureId::new(id))
        })
    }

    fn list_structures(&self) -> StoreFuture<Vec<StructureSlug>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = sqlx::query_as::<_, (i64, String)>(
                "SELECT structure_id, name FROM structures ORDER BY structure_id",
            )
            .fetch_all(&store.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|(id, name)| StructureSlug {
                    id: StructureId::new(id),
                    name,
                })
                .collect())
        })
    }
}
