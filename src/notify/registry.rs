//! Long-poll waiters keyed by tournament.
//!
//! A viewer [`subscribe`](SubscriberRegistry::subscribe)s with the version it
//! already has. If storage holds a different version the subscription is
//! fulfilled on the spot; otherwise a waiter is parked until the next
//! [`publish`](SubscriberRegistry::publish) or
//! [`publish_deleted`](SubscriberRegistry::publish_deleted) for that id.
//! Each waiter owns one [`oneshot`] sender, so it is fulfilled at most once.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};

use crate::domain::{Mutator, Tournament, TournamentId};
use crate::error::ClockError;
use crate::persistence::TournamentStore;

/// What a parked waiter receives.
#[derive(Debug)]
pub enum WaitOutcome {
    /// A newer snapshot, transients filled.
    Updated(Box<Tournament>),
    /// The tournament no longer exists.
    Deleted(TournamentId),
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    known_version: i64,
    tx: oneshot::Sender<WaitOutcome>,
}

type WaiterMap = HashMap<TournamentId, Vec<Waiter>>;

/// Registry of parked long-poll waiters.
///
/// # Concurrency
///
/// One [`Mutex`] guards the whole map. Subscribing holds it across the
/// storage read so that a save cannot slip in between the version check and
/// registration. Publishing only holds it to detach the waiters; transients
/// are filled and waiters fulfilled after it is released.
#[derive(Debug)]
pub struct SubscriberRegistry {
    store: Arc<dyn TournamentStore>,
    mutator: Mutator,
    waiters: Arc<Mutex<WaiterMap>>,
    next_waiter_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Creates a registry that reads current state from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TournamentStore>, mutator: Mutator) -> Self {
        Self {
            store,
            mutator,
            waiters: Arc::default(),
            next_waiter_id: AtomicU64::new(1),
        }
    }

    /// Waits for a version of tournament `id` other than `known_version`.
    ///
    /// A client that reports a version newer than the stored one is logged
    /// and answered with the stored copy.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TournamentNotFound`] for an unknown id and
    /// propagates storage failures.
    pub async fn subscribe(
        &self,
        id: TournamentId,
        known_version: i64,
    ) -> Result<Subscription, ClockError> {
        let mut waiters = self.waiters.lock().await;
        prune(&mut waiters);

        let current = self.store.fetch_tournament(id).await?;
        let (tx, rx) = oneshot::channel();

        if current.version != known_version {
            drop(waiters);
            if known_version > current.version {
                tracing::warn!(
                    tournament_id = %id,
                    client_version = known_version,
                    stored_version = current.version,
                    "client reports a version newer than storage"
                );
            }
            let mut current = current;
            self.mutator.fill_transients(&mut current);
            let _ = tx.send(WaitOutcome::Updated(Box::new(current)));
            return Ok(Subscription {
                tournament_id: id,
                waiter_id: None,
                rx,
                waiters: Arc::clone(&self.waiters),
            });
        }

        let waiter_id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        waiters.entry(id).or_default().push(Waiter {
            id: waiter_id,
            known_version,
            tx,
        });
        tracing::debug!(tournament_id = %id, waiter_id, known_version, "waiter parked");

        Ok(Subscription {
            tournament_id: id,
            waiter_id: Some(waiter_id),
            rx,
            waiters: Arc::clone(&self.waiters),
        })
    }

    /// Delivers `tournament` to every waiter on its id that does not
    /// already hold its version, and returns how many were reached.
    pub async fn publish(&self, tournament: Tournament) -> usize {
        let id = tournament.id;
        let version = tournament.version;
        let detached: Vec<Waiter> = {
            let mut waiters = self.waiters.lock().await;
            let Some(list) = waiters.remove(&id) else {
                return 0;
            };
            let (stale, current): (Vec<Waiter>, Vec<Waiter>) =
                list.into_iter().partition(|w| w.known_version != version);
            if !current.is_empty() {
                waiters.insert(id, current);
            }
            stale
        };
        if detached.is_empty() {
            return 0;
        }

        let mut tournament = tournament;
        self.mutator.fill_transients(&mut tournament);

        let mut delivered = 0;
        for waiter in detached {
            if waiter
                .tx
                .send(WaitOutcome::Updated(Box::new(tournament.clone())))
                .is_ok()
            {
                delivered += 1;
            }
        }
        tracing::debug!(tournament_id = %id, version, delivered, "published tournament");
        delivered
    }

    /// Tells every waiter on `id` that the tournament is gone, and returns
    /// how many were reached.
    pub async fn publish_deleted(&self, id: TournamentId) -> usize {
        let detached = self.waiters.lock().await.remove(&id).unwrap_or_default();
        let delivered = detached
            .into_iter()
            .map(|waiter| waiter.tx.send(WaitOutcome::Deleted(id)).is_ok())
            .filter(|sent| *sent)
            .count();
        tracing::debug!(tournament_id = %id, delivered, "published deletion");
        delivered
    }

    /// Returns the number of parked waiters on `id`.
    pub async fn waiter_count(&self, id: TournamentId) -> usize {
        self.waiters.lock().await.get(&id).map_or(0, Vec::len)
    }
}

/// Drops waiters whose receiving side has gone away.
fn prune(waiters: &mut WaiterMap) {
    waiters.retain(|_, list| {
        list.retain(|w| !w.tx.is_closed());
        !list.is_empty()
    });
}

/// One viewer's pending long-poll.
///
/// Dropping it before it is fulfilled releases its waiter.
#[derive(Debug)]
pub struct Subscription {
    tournament_id: TournamentId,
    waiter_id: Option<u64>,
    rx: oneshot::Receiver<WaitOutcome>,
    waiters: Arc<Mutex<WaiterMap>>,
}

impl Subscription {
    /// Waits up to `timeout` for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ListenTimeout`] when nothing arrives in time,
    /// [`ClockError::Deleted`] when the tournament was deleted, and
    /// [`ClockError::Internal`] if the registry went away.
    pub async fn wait(mut self, timeout: Duration) -> Result<Tournament, ClockError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(WaitOutcome::Updated(tournament))) => Ok(*tournament),
            Ok(Ok(WaitOutcome::Deleted(id))) => Err(ClockError::Deleted(id)),
            Ok(Err(_)) => Err(ClockError::Internal(
                "subscription dropped without an outcome".to_string(),
            )),
            Err(_) => Err(ClockError::ListenTimeout),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(waiter_id) = self.waiter_id else {
            return;
        };
        // A contended lock is left alone: the closed sender is pruned on the
        // next subscribe.
        if let Ok(mut waiters) = self.waiters.try_lock() {
            if let Some(list) = waiters.get_mut(&self.tournament_id) {
                list.retain(|w| w.id != waiter_id);
                if list.is_empty() {
                    waiters.remove(&self.tournament_id);
                }
            }
        }
    }
}
