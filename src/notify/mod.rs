//! Change notification: long-poll waiters and the feeds that wake them.
//!
//! Local writes are published through [`PublishingStore`]; writes from any
//! instance arrive as [`NotificationEvent`]s on a [`ChangeFeed`] and are
//! routed by the [`ChangeFeedBridge`].

pub mod change_feed;
pub mod publishing;
pub mod registry;

pub use change_feed::{
    BroadcastChangeFeed, ChangeConsumer, ChangeFeed, ChangeFeedBridge, NotificationEvent,
    PgChangeFeed, TournamentChangeDispatcher,
};
pub use publishing::PublishingStore;
pub use registry::{SubscriberRegistry, Subscription, WaitOutcome};
