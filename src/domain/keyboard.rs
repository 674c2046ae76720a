//! Keyboard shortcuts sent by the clock display.
//!
//! The viewer posts the name of the key action and whether shift was held.
//! Shift multiplies counts by ten, turns one minute into ten and turns a
//! level restart into a tournament restart.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::mutator::Mutation;

const MINUTE_MILLIS: i64 = 60_000;

/// A named key action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum KeyboardEvent {
    /// Next level.
    SkipLevel,
    /// Previous level.
    PreviousLevel,
    /// Start the clock.
    StartClock,
    /// Pause the clock.
    StopClock,
    /// One more player.
    AddPlayer,
    /// One player fewer.
    RemovePlayer,
    /// One more buy-in.
    AddBuyIn,
    /// One buy-in fewer.
    RemoveBuyIn,
    /// One more add-on.
    AddAddOn,
    /// One add-on fewer.
    RemoveAddOn,
    /// One more minute on the clock.
    PlusMinute,
    /// One minute off the clock.
    MinusMinute,
    /// Silence the end-of-level sound.
    MuteSound,
    /// Re-enable the end-of-level sound.
    UnmuteSound,
    /// Restart the level, or the tournament with shift.
    Restart,
}

impl Mutation {
    /// Maps a key action to the mutation it triggers.
    #[must_use]
    pub const fn from_keypress(event: KeyboardEvent, shift: bool) -> Self {
        let step = if shift { 10 } else { 1 };
        let minutes = step * MINUTE_MILLIS;
        match event {
            KeyboardEvent::SkipLevel => Self::AdvanceLevel,
            KeyboardEvent::PreviousLevel => Self::PreviousLevel,
            KeyboardEvent::StartClock => Self::StartClock,
            KeyboardEvent::StopClock => Self::StopClock,
            KeyboardEvent::AddPlayer => Self::ChangePlayers { delta: step },
            KeyboardEvent::RemovePlayer => Self::ChangePlayers { delta: -step },
            KeyboardEvent::AddBuyIn => Self::ChangeBuyIns { delta: step },
            KeyboardEvent::RemoveBuyIn => Self::ChangeBuyIns { delta: -step },
            KeyboardEvent::AddAddOn => Self::ChangeAddOns { delta: step },
            KeyboardEvent::RemoveAddOn => Self::ChangeAddOns { delta: -step },
            KeyboardEvent::PlusMinute => Self::PlusTime { millis: minutes },
            KeyboardEvent::MinusMinute => Self::MinusTime { millis: minutes },
            KeyboardEvent::MuteSound => Self::MuteSound,
            KeyboardEvent::UnmuteSound => Self::UnmuteSound,
            KeyboardEvent::Restart if shift => Self::RestartTournament,
            KeyboardEvent::Restart => Self::RestartLevel,
        }
    }
}
