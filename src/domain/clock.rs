//! Time sources and the running/paused timing representation.
//!
//! A tournament is either running, in which case only the instant its
//! current level ends is known, or paused, in which case only the time left
//! in the level is known. [`ClockState`] makes those two representations
//! mutually exclusive.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Source of the current instant.
///
/// The mutator never reads the system time directly so that reconciliation
/// can be tested against a controlled clock.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map_or_else(|poisoned| *poisoned.into_inner(), |now| *now)
    }
}

/// Timing of the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClockState {
    /// The clock is ticking; the level ends at `ends_at`.
    Running {
        /// Absolute instant the current level ends.
        #[serde(with = "chrono::serde::ts_milliseconds", rename = "ends_at_millis")]
        ends_at: DateTime<Utc>,
    },
    /// The clock is stopped with `remaining` left in the level.
    Paused {
        /// Time left in the current level.
        #[serde(with = "millis", rename = "remaining_millis")]
        remaining: TimeDelta,
    },
}

impl ClockState {
    /// Returns `true` for [`ClockState::Running`].
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Returns the end instant when running.
    #[must_use]
    pub const fn ends_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Running { ends_at } => Some(*ends_at),
            Self::Paused { .. } => None,
        }
    }

    /// Returns the stored remaining time when paused.
    #[must_use]
    pub const fn paused_remaining(&self) -> Option<TimeDelta> {
        match self {
            Self::Running { .. } => None,
            Self::Paused { remaining } => Some(*remaining),
        }
    }

    /// Returns the time left in the level as of `now`, never negative.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        match self {
            Self::Running { ends_at } => remaining_at(*ends_at, now),
            Self::Paused { remaining } => (*remaining).max(TimeDelta::zero()),
        }
    }
}

/// Converts an end instant to time remaining at `now`, clamped to zero.
#[must_use]
pub fn remaining_at(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    (ends_at - now).max(TimeDelta::zero())
}

/// Converts time remaining at `now` to an end instant, saturating at the
/// latest representable instant.
#[must_use]
pub fn ends_at_from(remaining: TimeDelta, now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_signed(remaining)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Serde helper storing a [`TimeDelta`] as integer milliseconds.
pub mod millis {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes `delta` as whole milliseconds.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(delta.num_milliseconds())
    }

    /// Deserializes whole milliseconds into a [`TimeDelta`].
    ///
    /// # Errors
    ///
    /// Propagates deserializer errors.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        Ok(TimeDelta::milliseconds(ms))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        let Some(t) = Utc.timestamp_millis_opt(1_700_000_000_000).single() else {
            panic!("valid timestamp");
        };
        t
    }

    #[test]
    fn remaining_is_clamped_at_zero() {
        let ends = t0();
        assert_eq!(remaining_at(ends, ends + TimeDelta::seconds(5)), TimeDelta::zero());
        assert_eq!(
            remaining_at(ends, ends - TimeDelta::seconds(5)),
            TimeDelta::seconds(5)
        );
    }

    #[test]
    fn conversions_are_inverse() {
        let now = t0();
        let remaining = TimeDelta::milliseconds(123_456);
        assert_eq!(remaining_at(ends_at_from(remaining, now), now), remaining);
    }

    #[test]
    fn end_instant_saturates() {
        assert_eq!(ends_at_from(TimeDelta::MAX, t0()), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(t0());
        clock.advance(TimeDelta::minutes(2));
        assert_eq!(clock.now(), t0() + TimeDelta::minutes(2));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn serialized_form_is_tagged() {
        let paused = ClockState::Paused {
            remaining: TimeDelta::milliseconds(900_000),
        };
        let json = serde_json::to_value(paused).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({"mode": "paused", "remaining_millis": 900_000}))
        );

        let running = ClockState::Running { ends_at: t0() };
        let json = serde_json::to_value(running).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({"mode": "running", "ends_at_millis": 1_700_000_000_000_i64}))
        );
    }
}
