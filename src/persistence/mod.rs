//! Persistence layer: versioned tournament storage.
//!
//! Provides the [`TournamentStore`] trait with optimistic concurrency on
//! tournament saves, two backends ([`MemoryStore`] and [`PostgresStore`])
//! and the read-through [`CachingStore`] decorator.

pub mod cache;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use cache::CachingStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{StoreFuture, TournamentStore};
