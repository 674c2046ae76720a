//! Domain layer: tournament model, clock transitions, and payouts.
//!
//! This module contains the clock core: typed identifiers, levels and
//! structures, the running/paused timing representation, the tournament
//! aggregate, and the [`Mutator`] that applies every state transition.
//! Nothing here performs I/O.

pub mod clock;
pub mod defaults;
pub mod keyboard;
pub mod level;
pub mod mutator;
pub mod paytable;
pub mod sound;
pub mod tournament;
pub mod tournament_id;

pub use clock::{Clock, ClockState, ManualClock, SystemClock};
pub use keyboard::KeyboardEvent;
pub use level::{Level, Structure, StructureSlug};
pub use mutator::{Mutation, Mutator};
pub use paytable::{BuiltinPaytables, Paytable, PaytableFetcher};
pub use sound::{BuiltinSounds, SoundEffect, SoundEffectFetcher};
pub use tournament::{PROTOCOL_VERSION, Tournament, TournamentSlug, TournamentState, Transients};
pub use tournament_id::{StructureId, TournamentId};
