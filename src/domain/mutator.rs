//! State transitions of a tournament clock.
//!
//! The [`Mutator`] is the only component that changes [`TournamentState`].
//! Every operation first reconciles the state with the injected [`Clock`]
//! (see [`Mutator::reconcile`]) and works on a scratch copy that is only
//! committed when the operation succeeds, so an error leaves the tournament
//! exactly as it was.
//!
//! [`TournamentState`]: super::TournamentState

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::clock::{Clock, ClockState, ends_at_from, remaining_at};
use super::paytable::{PaytableFetcher, render_prize_pool};
use super::sound::SoundEffectFetcher;
use super::tournament::{PROTOCOL_VERSION, Transients, Tournament};
use crate::error::ClockError;

/// One requested change to a tournament.
///
/// Each variant maps to exactly one [`Mutator`] operation; the service
/// applies it and then saves once with the pre-mutation version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Start a paused clock.
    StartClock,
    /// Pause a running clock.
    StopClock,
    /// Move to the next level.
    AdvanceLevel,
    /// Move to the previous level.
    PreviousLevel,
    /// Add time to the current level.
    PlusTime {
        /// Milliseconds to add.
        millis: i64,
    },
    /// Remove time, spilling into later levels.
    MinusTime {
        /// Milliseconds to remove; must not be negative.
        millis: i64,
    },
    /// Set the time left in the current level.
    SetLevelRemaining {
        /// Milliseconds left, clamped to the level.
        millis: i64,
    },
    /// Adjust the number of players still in.
    ChangePlayers {
        /// Signed change.
        delta: i64,
    },
    /// Adjust the number of buy-ins sold.
    ChangeBuyIns {
        /// Signed change.
        delta: i64,
    },
    /// Adjust the number of add-ons sold.
    ChangeAddOns {
        /// Signed change.
        delta: i64,
    },
    /// Pause and reset the current level to its full duration.
    RestartLevel,
    /// Pause and go back to the first level.
    RestartTournament,
    /// Silence the end-of-level sound.
    MuteSound,
    /// Re-enable the end-of-level sound.
    UnmuteSound,
}

/// Applies clock transitions against an injected time source.
#[derive(Debug, Clone)]
pub struct Mutator {
    clock: Arc<dyn Clock>,
    paytables: Arc<dyn PaytableFetcher>,
    sounds: Arc<dyn SoundEffectFetcher>,
}

impl Mutator {
    /// Creates a mutator.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        paytables: Arc<dyn PaytableFetcher>,
        sounds: Arc<dyn SoundEffectFetcher>,
    ) -> Self {
        Self {
            clock,
            paytables,
            sounds,
        }
    }

    /// Applies `mutation` to `t`.
    ///
    /// # Errors
    ///
    /// Returns whatever the underlying operation returns; `t` is unchanged
    /// on error.
    pub fn apply(&self, t: &mut Tournament, mutation: Mutation) -> Result<(), ClockError> {
        match mutation {
            Mutation::StartClock => self.start_clock(t),
            Mutation::StopClock => self.stop_clock(t),
            Mutation::AdvanceLevel => self.advance_level(t),
            Mutation::PreviousLevel => self.previous_level(t),
            Mutation::PlusTime { millis } => self.plus_time(t, millis_delta(millis)?),
            Mutation::MinusTime { millis } => self.minus_time(t, millis_delta(millis)?),
            Mutation::SetLevelRemaining { millis } => {
                self.set_level_remaining(t, millis_delta(millis)?)
            }
            Mutation::ChangePlayers { delta } => self.change_players(t, delta),
            Mutation::ChangeBuyIns { delta } => self.change_buy_ins(t, delta),
            Mutation::ChangeAddOns { delta } => self.change_add_ons(t, delta),
            Mutation::RestartLevel => self.restart_level(t),
            Mutation::RestartTournament => self.restart_tournament(t),
            Mutation::MuteSound => self.mute_sound(t),
            Mutation::UnmuteSound => self.unmute_sound(t),
        }
    }

    /// Starts the clock: the level now ends at `now + remaining`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn start_clock(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, now| {
            start(draft, now);
            Ok(())
        })
    }

    /// Pauses the clock, keeping whatever time was left.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn stop_clock(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, now| {
            stop(draft, now);
            Ok(())
        })
    }

    /// Moves to the next level with its full duration, keeping the mode.
    /// At the last level the tournament enters end of time instead.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn advance_level(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, now| advance(draft, now))
    }

    /// Moves to the previous level with its full duration, keeping the mode.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::LevelOutOfRange`] at the first level and
    /// [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn previous_level(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, now| {
            if draft.state.current_level_number == 0 {
                return Err(ClockError::LevelOutOfRange {
                    id: draft.id,
                    level: -1,
                });
            }
            draft.state.current_level_number -= 1;
            reset_level_timing(draft, now)
        })
    }

    /// Adds `d` to the current level.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] for a negative `d` or one that
    /// pushes the level end out of range, and [`ClockError::NoCurrentLevel`]
    /// for an empty structure.
    pub fn plus_time(&self, t: &mut Tournament, d: TimeDelta) -> Result<(), ClockError> {
        if d < TimeDelta::zero() {
            return Err(ClockError::InvalidRequest(format!(
                "cannot add a negative duration ({} ms)",
                d.num_milliseconds()
            )));
        }
        self.transact(t, |draft, now| {
            let out_of_range = || {
                ClockError::InvalidRequest(format!(
                    "adding {} ms runs past the end of the calendar",
                    d.num_milliseconds()
                ))
            };
            draft.state.clock = match draft.state.clock {
                ClockState::Running { ends_at } => ClockState::Running {
                    ends_at: ends_at.checked_add_signed(d).ok_or_else(out_of_range)?,
                },
                ClockState::Paused { remaining } => {
                    let remaining = remaining.checked_add(&d).ok_or_else(out_of_range)?;
                    // Starting later must still yield a valid end instant.
                    if now.checked_add_signed(remaining).is_none() {
                        return Err(out_of_range());
                    }
                    ClockState::Paused { remaining }
                }
            };
            Ok(())
        })
    }

    /// Removes `d` from the current level. When `d` exceeds what is left,
    /// the deficit is carried into the following levels until it is used
    /// up; running out of levels enters end of time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] for a negative `d` and
    /// [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn minus_time(&self, t: &mut Tournament, d: TimeDelta) -> Result<(), ClockError> {
        if d < TimeDelta::zero() {
            return Err(ClockError::InvalidRequest(format!(
                "cannot remove a negative duration ({} ms)",
                d.num_milliseconds()
            )));
        }
        self.transact(t, |draft, now| {
            let was_running = draft.state.is_clock_running();
            stop(draft, now);

            let mut remaining = draft.state.clock.remaining(now) - d;
            while remaining < TimeDelta::zero() {
                advance(draft, now)?;
                if draft.is_end_of_time() {
                    return Ok(());
                }
                remaining += level_duration(draft)?;
            }

            draft.state.clock = ClockState::Paused { remaining };
            if was_running {
                start(draft, now);
            }
            Ok(())
        })
    }

    /// Sets the time left in the current level, clamped to
    /// `[0, level duration]`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn set_level_remaining(&self, t: &mut Tournament, d: TimeDelta) -> Result<(), ClockError> {
        self.transact(t, |draft, now| {
            let remaining = d.clamp(TimeDelta::zero(), level_duration(draft)?);
            draft.state.clock = match draft.state.clock {
                ClockState::Running { .. } => ClockState::Running {
                    ends_at: ends_at_from(remaining, now),
                },
                ClockState::Paused { .. } => ClockState::Paused { remaining },
            };
            Ok(())
        })
    }

    /// Adds `delta` players, never going below one.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn change_players(&self, t: &mut Tournament, delta: i64) -> Result<(), ClockError> {
        self.transact(t, |draft, _| {
            draft.state.current_players = draft.state.current_players.saturating_add(delta).max(1);
            Ok(())
        })
    }

    /// Adds `delta` buy-ins, never going below one.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn change_buy_ins(&self, t: &mut Tournament, delta: i64) -> Result<(), ClockError> {
        self.transact(t, |draft, _| {
            draft.state.buy_ins = draft.state.buy_ins.saturating_add(delta).max(1);
            Ok(())
        })
    }

    /// Adds `delta` add-ons, never going below zero.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn change_add_ons(&self, t: &mut Tournament, delta: i64) -> Result<(), ClockError> {
        self.transact(t, |draft, _| {
            draft.state.add_ons = draft.state.add_ons.saturating_add(delta).max(0);
            Ok(())
        })
    }

    /// Pauses with the full duration of the current level.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn restart_level(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, _| {
            draft.state.clock = ClockState::Paused {
                remaining: level_duration(draft)?,
            };
            Ok(())
        })
    }

    /// Pauses at the first level with its full duration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn restart_tournament(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, _| {
            draft.state.current_level_number = 0;
            draft.state.clock = ClockState::Paused {
                remaining: level_duration(draft)?,
            };
            Ok(())
        })
    }

    /// Silences the end-of-level sound.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn mute_sound(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, _| {
            draft.state.sound_muted = true;
            Ok(())
        })
    }

    /// Re-enables the end-of-level sound.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn unmute_sound(&self, t: &mut Tournament) -> Result<(), ClockError> {
        self.transact(t, |draft, _| {
            draft.state.sound_muted = false;
            Ok(())
        })
    }

    /// Brings a running tournament up to date with the clock.
    ///
    /// While the current level's end instant is at or before now, steps to
    /// the next level and pushes the end instant out by that level's
    /// duration, so time that overran a boundary is kept. Running off the
    /// last level enters end of time. An out-of-range level number is
    /// clamped to the last level.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoCurrentLevel`] for an empty structure.
    pub fn reconcile(&self, t: &mut Tournament) -> Result<(), ClockError> {
        let now = self.clock.now();
        reconcile_at(t, now)
    }

    /// Recomputes [`Transients`] and, when enabled, the prize pool text.
    ///
    /// Lookup failures for sounds and paytables are logged and leave the
    /// corresponding field as it was; they never fail the caller.
    pub fn fill_transients(&self, t: &mut Tournament) {
        if let Err(e) = self.reconcile(t) {
            tracing::warn!(tournament_id = %t.id, error = %e, "filling transients without reconciling");
        }

        let total_chips = t.total_chips();
        let average_chips = if t.state.current_players == 0 {
            0
        } else {
            rounded_div(total_chips, t.state.current_players)
        };

        let next_level_sound_path = t.next_level_sound_id.and_then(|id| {
            match self.sounds.fetch_sound_effect(id) {
                Ok(effect) => Some(effect.path),
                Err(e) => {
                    tracing::warn!(tournament_id = %t.id, sound_id = id, error = %e, "could not fetch sound effect");
                    None
                }
            }
        });

        t.transients = Some(Transients {
            protocol_version: PROTOCOL_VERSION,
            total_chips,
            average_chips,
            next_level_sound_path,
            next_break_level: t.next_break_level(),
        });

        if t.state.auto_compute_prize_pool {
            match self.prize_pool_text(t) {
                Ok(text) => t.state.prize_pool = text,
                Err(e) => {
                    tracing::debug!(tournament_id = %t.id, error = %e, "prize pool text not regenerated");
                }
            }
        }
    }

    /// Renders the payouts for the current buy-ins and saves.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] when the pool left after saves
    /// or the buy-in count is not positive, or the paytable cannot pay it.
    pub fn prize_pool_text(&self, t: &Tournament) -> Result<String, ClockError> {
        let paytable = self.paytables.fetch_paytable(t.paytable_id)?;
        let pool = t.prize_pool_less_saves();
        if pool <= 0 {
            return Err(ClockError::InvalidRequest(
                "total prize pool less saves must be positive".to_string(),
            ));
        }
        if t.state.buy_ins <= 0 {
            return Err(ClockError::InvalidRequest(
                "number of buy-ins must be positive".to_string(),
            ));
        }
        let prizes = paytable.payout(pool, t.state.buy_ins)?;
        Ok(render_prize_pool(
            &prizes,
            t.state.saves,
            t.state.amount_per_save,
        ))
    }

    fn transact<F>(&self, t: &mut Tournament, op: F) -> Result<(), ClockError>
    where
        F: FnOnce(&mut Tournament, DateTime<Utc>) -> Result<(), ClockError>,
    {
        let now = self.clock.now();
        let mut draft = t.clone();
        reconcile_at(&mut draft, now)?;
        op(&mut draft, now)?;
        self.fill_transients(&mut draft);
        *t = draft;
        Ok(())
    }
}

fn reconcile_at(t: &mut Tournament, now: DateTime<Utc>) -> Result<(), ClockError> {
    let last = t
        .structure
        .last_index()
        .ok_or(ClockError::NoCurrentLevel(t.id))?;

    if t.state.current_level_number > last {
        tracing::warn!(
            tournament_id = %t.id,
            level = t.state.current_level_number,
            last,
            "level number out of range, clamping"
        );
        t.state.current_level_number = last;
    }

    while let ClockState::Running { ends_at } = t.state.clock {
        if ends_at > now {
            break;
        }
        if t.state.current_level_number >= last {
            end_of_time(t, last);
            break;
        }
        t.state.current_level_number += 1;
        t.state.clock = ClockState::Running {
            ends_at: ends_at + level_duration(t)?,
        };
    }
    Ok(())
}

fn start(t: &mut Tournament, now: DateTime<Utc>) {
    if let ClockState::Paused { remaining } = t.state.clock {
        t.state.clock = ClockState::Running {
            ends_at: ends_at_from(remaining, now),
        };
    }
}

fn stop(t: &mut Tournament, now: DateTime<Utc>) {
    if let ClockState::Running { ends_at } = t.state.clock {
        t.state.clock = ClockState::Paused {
            remaining: remaining_at(ends_at, now),
        };
    }
}

fn advance(t: &mut Tournament, now: DateTime<Utc>) -> Result<(), ClockError> {
    let last = t
        .structure
        .last_index()
        .ok_or(ClockError::NoCurrentLevel(t.id))?;
    if t.state.current_level_number >= last {
        end_of_time(t, last);
        return Ok(());
    }
    t.state.current_level_number += 1;
    reset_level_timing(t, now)
}

fn reset_level_timing(t: &mut Tournament, now: DateTime<Utc>) -> Result<(), ClockError> {
    let duration = level_duration(t)?;
    t.state.clock = match t.state.clock {
        ClockState::Running { .. } => ClockState::Running {
            ends_at: ends_at_from(duration, now),
        },
        ClockState::Paused { .. } => ClockState::Paused {
            remaining: duration,
        },
    };
    Ok(())
}

/// Last level, paused, nothing left.
fn end_of_time(t: &mut Tournament, last: usize) {
    tracing::info!(tournament_id = %t.id, "tournament at end of time");
    t.state.current_level_number = last;
    t.state.clock = ClockState::Paused {
        remaining: TimeDelta::zero(),
    };
}

fn level_duration(t: &Tournament) -> Result<TimeDelta, ClockError> {
    t.active_level_duration()
        .ok_or(ClockError::NoCurrentLevel(t.id))
}

fn millis_delta(millis: i64) -> Result<TimeDelta, ClockError> {
    TimeDelta::try_milliseconds(millis)
        .ok_or_else(|| ClockError::InvalidRequest(format!("duration of {millis} ms is out of range")))
}

/// Integer division rounded half away from zero.
fn rounded_div(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.unsigned_abs().saturating_mul(2) >= denominator.unsigned_abs() {
        quotient.saturating_add(numerator.signum() * denominator.signum())
    } else {
        quotient
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::paytable::BuiltinPaytables;
    use crate::domain::sound::BuiltinSounds;
    use crate::domain::tournament::fixtures::tournament;

    fn t0() -> DateTime<Utc> {
        let Some(t) = Utc.timestamp_millis_opt(1_700_000_000_000).single() else {
            panic!("valid timestamp");
        };
        t
    }

    fn mutator() -> (Arc<ManualClock>, Mutator) {
        let clock = Arc::new(ManualClock::new(t0()));
        let mutator = Mutator::new(
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::new(BuiltinPaytables::new()),
            Arc::new(BuiltinSounds::new()),
        );
        (clock, mutator)
    }

    fn ok(result: Result<(), ClockError>) {
        if let Err(e) = result {
            panic!("unexpected error: {e}");
        }
    }

    #[test]
    fn start_sets_end_instant() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        assert_eq!(
            t.state.clock,
            ClockState::Running {
                ends_at: t0() + TimeDelta::minutes(15)
            }
        );
        assert!(t.state.is_clock_running());
        assert_eq!(t.current_level_ends_at(), Some(t0() + TimeDelta::minutes(15)));
    }

    #[test]
    fn stop_then_start_preserves_remaining() {
        let (clock, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        clock.advance(TimeDelta::seconds(100));
        ok(m.stop_clock(&mut t));
        let before = t.state.clock.paused_remaining();
        assert_eq!(before, Some(TimeDelta::seconds(800)));
        ok(m.start_clock(&mut t));
        ok(m.stop_clock(&mut t));
        assert_eq!(t.state.clock.paused_remaining(), before);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (clock, m) = mutator();
        let mut t = tournament();
        ok(m.stop_clock(&mut t));
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(15))
        );
        ok(m.start_clock(&mut t));
        clock.advance(TimeDelta::seconds(30));
        ok(m.start_clock(&mut t));
        assert_eq!(t.current_level_ends_at(), Some(t0() + TimeDelta::minutes(15)));
    }

    #[test]
    fn reconcile_carries_overrun_into_next_level() {
        let (clock, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        clock.set(t0() + TimeDelta::seconds(901));
        ok(m.reconcile(&mut t));
        assert_eq!(t.state.current_level_number, 1);
        assert_eq!(
            t.current_level_ends_at(),
            Some(t0() + TimeDelta::seconds(900) + TimeDelta::minutes(20))
        );
    }

    #[test]
    fn reconcile_skips_several_levels() {
        let (clock, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        // 15 + 20 minutes elapsed plus one second.
        clock.set(t0() + TimeDelta::minutes(35) + TimeDelta::seconds(1));
        ok(m.reconcile(&mut t));
        assert_eq!(t.state.current_level_number, 2);
        assert_eq!(
            t.current_level_ends_at(),
            Some(t0() + TimeDelta::minutes(65))
        );
    }

    #[test]
    fn reconcile_past_last_level_is_end_of_time() {
        let (clock, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        clock.set(t0() + TimeDelta::hours(10));
        ok(m.reconcile(&mut t));
        assert!(t.is_end_of_time());
        assert!(!t.state.is_clock_running());
    }

    #[test]
    fn reconcile_clamps_level_number() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.state.current_level_number = 42;
        ok(m.reconcile(&mut t));
        assert_eq!(t.state.current_level_number, 3);
    }

    #[test]
    fn advance_keeps_mode_and_resets_time() {
        let (clock, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        clock.advance(TimeDelta::minutes(3));
        ok(m.advance_level(&mut t));
        assert_eq!(t.state.current_level_number, 1);
        assert_eq!(
            t.current_level_ends_at(),
            Some(t0() + TimeDelta::minutes(3) + TimeDelta::minutes(20))
        );

        ok(m.stop_clock(&mut t));
        ok(m.advance_level(&mut t));
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(30))
        );
    }

    #[test]
    fn advance_at_last_level_is_end_of_time() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.state.current_level_number = 3;
        ok(m.start_clock(&mut t));
        ok(m.advance_level(&mut t));
        assert!(t.is_end_of_time());
        assert_eq!(t.state.current_level_number, 3);
    }

    #[test]
    fn previous_at_first_level_fails_without_change() {
        let (_, m) = mutator();
        let mut t = tournament();
        let before = t.clone();
        let result = m.previous_level(&mut t);
        assert!(matches!(
            result,
            Err(ClockError::LevelOutOfRange { level: -1, .. })
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn previous_restores_full_duration() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.state.current_level_number = 2;
        ok(m.previous_level(&mut t));
        assert_eq!(t.state.current_level_number, 1);
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(20))
        );
    }

    #[test]
    fn plus_time_extends_either_mode() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.plus_time(&mut t, TimeDelta::minutes(1)));
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(16))
        );
        ok(m.start_clock(&mut t));
        ok(m.plus_time(&mut t, TimeDelta::minutes(10)));
        assert_eq!(t.current_level_ends_at(), Some(t0() + TimeDelta::minutes(26)));
    }

    #[test]
    fn plus_time_rejects_negative_without_change() {
        let (_, m) = mutator();
        let mut t = tournament();
        let before = t.clone();
        assert!(matches!(
            m.plus_time(&mut t, TimeDelta::minutes(-20)),
            Err(ClockError::InvalidRequest(_))
        ));
        assert!(matches!(
            m.apply(&mut t, Mutation::PlusTime { millis: -1 }),
            Err(ClockError::InvalidRequest(_))
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn plus_time_past_the_calendar_is_rejected() {
        let (_, m) = mutator();
        let mut t = tournament();
        let huge = Mutation::PlusTime { millis: i64::MAX };
        assert!(matches!(
            m.apply(&mut t, huge),
            Err(ClockError::InvalidRequest(_))
        ));
        ok(m.start_clock(&mut t));
        let before = t.clone();
        assert!(matches!(
            m.apply(&mut t, huge),
            Err(ClockError::InvalidRequest(_))
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn unrepresentable_durations_are_rejected() {
        let (_, m) = mutator();
        let mut t = tournament();
        let before = t.clone();
        for mutation in [
            Mutation::PlusTime { millis: i64::MIN },
            Mutation::MinusTime { millis: i64::MIN },
            Mutation::SetLevelRemaining { millis: i64::MIN },
        ] {
            assert!(matches!(
                m.apply(&mut t, mutation),
                Err(ClockError::InvalidRequest(_))
            ));
        }
        assert_eq!(t, before);
    }

    #[test]
    fn minus_time_of_max_duration_is_end_of_time() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.apply(&mut t, Mutation::MinusTime { millis: i64::MAX }));
        assert!(t.is_end_of_time());
    }

    #[test]
    fn minus_time_within_level() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.minus_time(&mut t, TimeDelta::minutes(5)));
        assert_eq!(t.state.current_level_number, 0);
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(10))
        );
    }

    #[test]
    fn minus_time_spills_into_following_levels() {
        let (_, m) = mutator();
        let mut t = tournament();
        // 15 minutes in level 0 plus 20 in level 1, then 5 more from level 2.
        ok(m.minus_time(&mut t, TimeDelta::minutes(40)));
        assert_eq!(t.state.current_level_number, 2);
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(25))
        );
        assert!(!t.state.is_clock_running());
    }

    #[test]
    fn minus_time_exactly_to_boundary_stays_at_zero() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.minus_time(&mut t, TimeDelta::minutes(15)));
        assert_eq!(t.state.current_level_number, 0);
        assert_eq!(t.state.clock.paused_remaining(), Some(TimeDelta::zero()));
    }

    #[test]
    fn minus_time_restarts_a_running_clock() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        ok(m.minus_time(&mut t, TimeDelta::minutes(16)));
        assert_eq!(t.state.current_level_number, 1);
        assert_eq!(t.current_level_ends_at(), Some(t0() + TimeDelta::minutes(19)));
    }

    #[test]
    fn minus_time_past_the_end_is_end_of_time() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.start_clock(&mut t));
        ok(m.minus_time(&mut t, TimeDelta::hours(5)));
        assert!(t.is_end_of_time());
        assert!(!t.state.is_clock_running());
    }

    #[test]
    fn minus_time_rejects_negative() {
        let (_, m) = mutator();
        let mut t = tournament();
        let before = t.clone();
        let result = m.minus_time(&mut t, TimeDelta::minutes(-1));
        assert!(matches!(result, Err(ClockError::InvalidRequest(_))));
        assert_eq!(t, before);
    }

    #[test]
    fn set_level_remaining_is_clamped() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.set_level_remaining(&mut t, TimeDelta::hours(1)));
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(15))
        );
        ok(m.set_level_remaining(&mut t, TimeDelta::minutes(-3)));
        assert_eq!(t.state.clock.paused_remaining(), Some(TimeDelta::zero()));
        ok(m.set_level_remaining(&mut t, TimeDelta::minutes(10)));
        ok(m.start_clock(&mut t));
        ok(m.set_level_remaining(&mut t, TimeDelta::minutes(7)));
        assert_eq!(t.state.current_level_number, 0);
        assert_eq!(t.current_level_ends_at(), Some(t0() + TimeDelta::minutes(7)));
    }

    #[test]
    fn buy_ins_update_chip_totals() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.change_players(&mut t, 7));
        ok(m.change_buy_ins(&mut t, 5));
        let Some(transients) = t.transients.clone() else {
            panic!("transients filled");
        };
        assert_eq!(transients.total_chips, 1500);
        // 1500 / 7 = 214.28...
        assert_eq!(transients.average_chips, 214);
        assert_eq!(transients.protocol_version, PROTOCOL_VERSION);
        assert_eq!(transients.next_break_level, Some(3));
    }

    #[test]
    fn counts_are_clamped() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.change_players(&mut t, -10));
        ok(m.change_buy_ins(&mut t, -10));
        ok(m.change_add_ons(&mut t, -10));
        assert_eq!(t.state.current_players, 1);
        assert_eq!(t.state.buy_ins, 1);
        assert_eq!(t.state.add_ons, 0);
    }

    #[test]
    fn huge_counts_saturate_chip_totals() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.state.auto_compute_prize_pool = true;
        ok(m.change_players(&mut t, 3));
        ok(m.apply(&mut t, Mutation::ChangeBuyIns { delta: i64::MAX }));
        ok(m.apply(&mut t, Mutation::ChangeAddOns { delta: i64::MAX }));
        assert_eq!(t.state.buy_ins, i64::MAX);
        let Some(transients) = t.transients.clone() else {
            panic!("transients filled");
        };
        assert_eq!(transients.total_chips, i64::MAX);
        assert_eq!(transients.average_chips, rounded_div(i64::MAX, 3));
        assert_eq!(t.prize_pool_less_saves(), i64::MAX);
    }

    #[test]
    fn restarts_pause_at_full_duration() {
        let (clock, m) = mutator();
        let mut t = tournament();
        t.state.current_level_number = 1;
        ok(m.start_clock(&mut t));
        clock.advance(TimeDelta::minutes(4));
        ok(m.restart_level(&mut t));
        assert_eq!(t.state.current_level_number, 1);
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(20))
        );

        ok(m.restart_tournament(&mut t));
        assert_eq!(t.state.current_level_number, 0);
        assert_eq!(
            t.state.clock.paused_remaining(),
            Some(TimeDelta::minutes(15))
        );
    }

    #[test]
    fn empty_structure_is_rejected_without_change() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.structure.levels.clear();
        let before = t.clone();
        assert!(matches!(
            m.start_clock(&mut t),
            Err(ClockError::NoCurrentLevel(_))
        ));
        assert!(matches!(
            m.apply(&mut t, Mutation::ChangeBuyIns { delta: 1 }),
            Err(ClockError::NoCurrentLevel(_))
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn mute_toggles() {
        let (_, m) = mutator();
        let mut t = tournament();
        ok(m.apply(&mut t, Mutation::MuteSound));
        assert!(t.state.sound_muted);
        ok(m.apply(&mut t, Mutation::UnmuteSound));
        assert!(!t.state.sound_muted);
    }

    #[test]
    fn sound_path_is_resolved() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.next_level_sound_id = Some(2);
        m.fill_transients(&mut t);
        let path = t
            .transients
            .as_ref()
            .and_then(|tr| tr.next_level_sound_path.clone());
        assert_eq!(path.as_deref(), Some("/fs/inchy.mp3"));

        t.next_level_sound_id = Some(77);
        m.fill_transients(&mut t);
        let path = t
            .transients
            .as_ref()
            .and_then(|tr| tr.next_level_sound_path.clone());
        assert_eq!(path, None);
    }

    #[test]
    fn prize_pool_text_is_regenerated() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.state.auto_compute_prize_pool = true;
        t.state.saves = 1;
        t.state.amount_per_save = 40;
        ok(m.change_buy_ins(&mut t, 10));
        // 400 less one save of 40; 108 and 72 round down to 105 and 70,
        // the 5 left over goes to first.
        assert_eq!(
            t.state.prize_pool,
            "1st: $185\n2nd: $105\n3rd: $70\n4th: $40*\n* save"
        );
    }

    #[test]
    fn prize_pool_text_untouched_when_disabled() {
        let (_, m) = mutator();
        let mut t = tournament();
        t.state.prize_pool = "see the board".to_string();
        ok(m.change_buy_ins(&mut t, 10));
        assert_eq!(t.state.prize_pool, "see the board");
    }

    #[test]
    fn mutation_wire_format() {
        let json = serde_json::json!({"op": "plus_time", "millis": 60_000});
        let Ok(mutation) = serde_json::from_value::<Mutation>(json) else {
            panic!("mutation parses");
        };
        assert_eq!(mutation, Mutation::PlusTime { millis: 60_000 });
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(rounded_div(7, 2), 4);
        assert_eq!(rounded_div(10, 4), 3);
        assert_eq!(rounded_div(9, 4), 2);
        assert_eq!(rounded_div(0, 5), 0);
        assert_eq!(rounded_div(i64::MAX, 1), i64::MAX);
        assert_eq!(rounded_div(i64::MAX, 2), i64::MAX / 2 + 1);
    }
}
