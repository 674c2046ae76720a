//! Bridges storage change notifications into the subscriber registry.
//!
//! Every committed write to a watched table produces a JSON
//! [`NotificationEvent`] on the `<table>_changes` channel, whichever server
//! instance made it. The [`ChangeFeedBridge`] reads those one at a time and
//! hands each to the [`ChangeConsumer`] registered for its table on a task
//! of its own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::SubscriberRegistry;
use crate::domain::TournamentId;
use crate::error::ClockError;
use crate::persistence::{CachingStore, TournamentStore};

/// A row changed in `table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Table the row lives in.
    pub table: String,
    /// Primary key of the row.
    pub id: i64,
    /// Row version after the change (before it, for deletions).
    pub version: i64,
}

/// Channel name carrying changes for `table`.
#[must_use]
pub fn channel_for(table: &str) -> String {
    format!("{table}_changes")
}

/// A source of raw notification payloads.
pub trait ChangeFeed: Send + fmt::Debug {
    /// Waits for the next payload. `Ok(None)` means the feed is closed for
    /// good.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, ClockError>>;
}

/// PostgreSQL `LISTEN` on one channel per watched table.
#[derive(Debug)]
pub struct PgChangeFeed {
    listener: PgListener,
}

impl PgChangeFeed {
    /// Opens a dedicated connection and listens on `channels`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::PersistenceError`] if the connection or the
    /// `LISTEN` fails.
    pub async fn connect(pool: &PgPool, channels: &[String]) -> Result<Self, ClockError> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener
            .listen_all(channels.iter().map(String::as_str))
            .await?;
        tracing::info!(?channels, "listening for database changes");
        Ok(Self { listener })
    }
}

impl ChangeFeed for PgChangeFeed {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, ClockError>> {
        Box::pin(async move {
            match self.listener.try_recv().await {
                Ok(Some(notification)) => Ok(Some(notification.payload().to_string())),
                // The listener reconnects on the next call.
                Ok(None) => Err(ClockError::ChangeFeed(
                    "database connection lost".to_string(),
                )),
                Err(e) => Err(ClockError::ChangeFeed(e.to_string())),
            }
        })
    }
}

/// In-process feed fed by [`crate::persistence::MemoryStore`].
#[derive(Debug)]
pub struct BroadcastChangeFeed {
    rx: broadcast::Receiver<String>,
}

impl BroadcastChangeFeed {
    /// Reads payloads from `rx`.
    #[must_use]
    pub const fn new(rx: broadcast::Receiver<String>) -> Self {
        Self { rx }
    }
}

impl ChangeFeed for BroadcastChangeFeed {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, ClockError>> {
        Box::pin(async move {
            match self.rx.recv().await {
                Ok(payload) => Ok(Some(payload)),
                Err(broadcast::error::RecvError::Closed) => Ok(None),
                Err(broadcast::error::RecvError::Lagged(skipped)) => Err(ClockError::ChangeFeed(
                    format!("feed lagged, {skipped} notifications dropped"),
                )),
            }
        })
    }
}

/// Handles the events of one table.
pub trait ChangeConsumer: Send + Sync + fmt::Debug {
    /// Table whose events this consumer takes.
    fn table_name(&self) -> &str;

    /// Reacts to one event.
    fn consume(&self, event: NotificationEvent) -> BoxFuture<'static, ()>;
}

/// Invalidates, re-reads and publishes changed tournaments.
#[derive(Debug, Clone)]
pub struct TournamentChangeDispatcher {
    cache: Option<CachingStore>,
    store: Arc<dyn TournamentStore>,
    registry: Arc<SubscriberRegistry>,
}

impl TournamentChangeDispatcher {
    /// Creates a dispatcher. `store` should read through `cache` when one
    /// is given, so the re-read repopulates it.
    #[must_use]
    pub fn new(
        cache: Option<CachingStore>,
        store: Arc<dyn TournamentStore>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            cache,
            store,
            registry,
        }
    }
}

impl ChangeConsumer for TournamentChangeDispatcher {
    fn table_name(&self) -> &str {
        "tournaments"
    }

    fn consume(&self, event: NotificationEvent) -> BoxFuture<'static, ()> {
        let dispatcher = self.clone();
        Box::pin(async move {
            let id = TournamentId::new(event.id);
            if let Some(cache) = &dispatcher.cache {
                cache.invalidate(id, event.version).await;
            }
            match dispatcher.store.fetch_tournament(id).await {
                Ok(tournament) => {
                    dispatcher.registry.publish(tournament).await;
                }
                Err(e) if e.is_not_found() => {
                    dispatcher.registry.publish_deleted(id).await;
                }
                Err(e) => {
                    tracing::warn!(tournament_id = %id, error = %e, "re-reading changed tournament");
                }
            }
        })
    }
}

/// Routes feed payloads to per-table consumers.
#[derive(Debug)]
pub struct ChangeFeedBridge {
    consumers: HashMap<String, Arc<dyn ChangeConsumer>>,
    backoff: Duration,
}

impl ChangeFeedBridge {
    /// Creates a bridge that waits `backoff` after a feed error.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Internal`] if two consumers claim one table.
    pub fn new(
        consumers: Vec<Arc<dyn ChangeConsumer>>,
        backoff: Duration,
    ) -> Result<Self, ClockError> {
        let mut by_table: HashMap<String, Arc<dyn ChangeConsumer>> = HashMap::new();
        for consumer in consumers {
            let table = consumer.table_name().to_string();
            if by_table.contains_key(&table) {
                return Err(ClockError::Internal(format!(
                    "duplicate change consumer for table {table}"
                )));
            }
            by_table.insert(table, consumer);
        }
        Ok(Self {
            consumers: by_table,
            backoff,
        })
    }

    /// Channels the feed must listen on, one per consumed table.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.consumers.keys().map(|t| channel_for(t)).collect();
        channels.sort();
        channels
    }

    /// Decodes `payload` and spawns its consumer.
    ///
    /// Returns `None` for malformed payloads and tables nobody consumes.
    pub fn dispatch(&self, payload: &str) -> Option<JoinHandle<()>> {
        let event: NotificationEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(payload, error = %e, "skipping malformed change notification");
                return None;
            }
        };
        let Some(consumer) = self.consumers.get(&event.table) else {
            tracing::debug!(table = %event.table, "no consumer for table, ignoring");
            return None;
        };
        tracing::debug!(table = %event.table, id = event.id, version = event.version, "change notification");
        Some(tokio::spawn(consumer.consume(event)))
    }

    /// Reads `feed` until it closes or `cancel` fires.
    pub async fn run(self, mut feed: Box<dyn ChangeFeed>, cancel: CancellationToken) {
        tracing::info!(tables = ?self.consumers.keys().collect::<Vec<_>>(), "change feed bridge started");
        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => break,
                next = feed.recv() => next,
            };
            match next {
                Ok(Some(payload)) => {
                    self.dispatch(&payload);
                }
                Ok(None) => {
                    tracing::info!("change feed closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, backoff_ms = self.backoff.as_millis(), "change feed error, backing off");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
        tracing::info!("change feed bridge stopped");
    }
}
