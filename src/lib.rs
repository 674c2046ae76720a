//! # tourney-clock
//!
//! Live tournament clock server. Tournaments are stored with an optimistic
//! version counter; every change goes through the [`domain::Mutator`] and
//! one versioned save, and viewers long-poll for the next version.
//!
//! ## Architecture
//!
//! ```text
//! Clock pages (HTTP long-poll, keyboard control)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── TournamentService (service/)
//!     ├── Mutator, clock model (domain/)
//!     │
//!     ├── PublishingStore ──► SubscriberRegistry (notify/)
//!     ├── CachingStore (persistence/)
//!     ├── PostgresStore | MemoryStore (persistence/)
//!     │
//!     └── change feed (LISTEN/NOTIFY) ──► ChangeFeedBridge (notify/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod service;
