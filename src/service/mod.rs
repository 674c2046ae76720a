//! Service layer: business logic orchestration.
//!
//! [`TournamentService`] loads tournaments, applies one mutation per call,
//! saves under optimistic concurrency and serves long-polls through the
//! [`crate::notify::SubscriberRegistry`].

pub mod tournament_service;

pub use tournament_service::{StructureDraft, TournamentDraft, TournamentService};
