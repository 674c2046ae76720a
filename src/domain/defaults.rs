//! The structure and tournament a fresh server starts with.

use chrono::TimeDelta;

use super::level::{Level, Structure};
use super::tournament::{Tournament, TournamentState};
use super::{StructureId, TournamentId};

fn break_level(description: &str, minutes: u32) -> Level {
    Level {
        banner: "BREAK".to_string(),
        description: description.to_string(),
        duration_minutes: minutes,
        is_break: true,
    }
}

/// A twelve-level home-game structure: a short "awaiting start" break,
/// fifteen-minute blind levels, and race-off breaks.
#[must_use]
pub fn default_structure() -> Structure {
    let mut number = 0;
    let mut blind = |description: &str| {
        number += 1;
        Level {
            banner: format!("LEVEL {number}"),
            description: description.to_string(),
            duration_minutes: 15,
            is_break: false,
        }
    };

    let levels = vec![
        break_level("AWAITING START...", 5),
        blind("5-5 + 5 ANTE"),
        blind("5-10 + 10 ANTE"),
        blind("10-15 + 15 ANTE"),
        blind("15-30 + 30 ANTE"),
        break_level("RACE OFF 5 CHIPS", 15),
        blind("20-40 + 40 ANTE"),
        blind("30-60 + 60 ANTE"),
        blind("40-80 + 80 ANTE"),
        blind("60-120 + 120 ANTE"),
        blind("100-200 + 200 ANTE"),
        break_level("RACE OFF 20 CHIPS", 15),
    ];

    Structure {
        id: StructureId::new(0),
        name: "Default".to_string(),
        version: 0,
        levels,
        chips_per_buy_in: 1500,
        chips_per_add_on: 0,
    }
}

/// A paused demo tournament on `structure`, paying out with the built-in
/// paytable and ringing the school bell between levels.
#[must_use]
pub fn demo_tournament(structure: Structure) -> Tournament {
    let remaining = structure
        .level(0)
        .map_or_else(TimeDelta::zero, Level::duration);
    let mut state = TournamentState::new(remaining);
    state.auto_compute_prize_pool = true;

    Tournament {
        id: TournamentId::new(0),
        version: 0,
        name: "Demo Tournament".to_string(),
        handle: "demo".to_string(),
        description: "Created at startup".to_string(),
        structure_id: structure.id,
        structure,
        prize_pool_per_buy_in: 20,
        prize_pool_per_add_on: 0,
        paytable_id: 1,
        next_level_sound_id: Some(1),
        state,
        transients: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_structure_shape() {
        let s = default_structure();
        assert_eq!(s.levels.len(), 12);
        assert_eq!(s.levels.iter().filter(|l| l.is_break).count(), 3);
        assert_eq!(
            s.level(1).map(|l| l.banner.as_str()),
            Some("LEVEL 1")
        );
        assert_eq!(s.level(10).map(|l| l.banner.as_str()), Some("LEVEL 9"));
    }

    #[test]
    fn demo_starts_paused_on_first_level() {
        let t = demo_tournament(default_structure());
        assert!(!t.state.is_clock_running());
        assert_eq!(t.state.clock.paused_remaining(), Some(TimeDelta::minutes(5)));
        assert_eq!(t.next_break_level(), Some(5));
    }
}
