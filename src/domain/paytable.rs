//! Payout tables and prize pool text.
//!
//! A [`Paytable`] holds basis-point percentages per range of entrants.
//! Payouts are rounded down to the table's increment and the rounding
//! remainder is handed back out one increment at a time from first place.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClockError;

/// Payout percentages for a range of entrant counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaytableRow {
    /// Minimum entrants, inclusive.
    pub min_players: i64,
    /// Maximum entrants, inclusive.
    pub max_players: i64,
    /// Basis points per place; index 0 is first place.
    pub percentages: Vec<i64>,
}

/// A named payout table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paytable {
    /// Paytable identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Smallest unit a prize is rounded to.
    pub increment: i64,
    /// Rows ordered by entrant count.
    pub rows: Vec<PaytableRow>,
}

impl Paytable {
    /// Splits `prize_pool` among places for `entrants`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] if no row covers `entrants` or
    /// the increment is not positive.
    pub fn payout(&self, prize_pool: i64, entrants: i64) -> Result<Vec<i64>, ClockError> {
        if self.increment <= 0 {
            return Err(ClockError::InvalidRequest(format!(
                "paytable {} has non-positive increment {}",
                self.id, self.increment
            )));
        }
        let percentages = self.find_row(entrants).ok_or_else(|| {
            ClockError::InvalidRequest(format!("no payout row found for {entrants} players"))
        })?;

        let too_large = || {
            ClockError::InvalidRequest(format!(
                "prize pool {prize_pool} is too large for paytable {}",
                self.id
            ))
        };
        let mut prizes = percentages
            .iter()
            .map(|bps| {
                let share = i128::from(prize_pool) * i128::from(*bps) / 10_000;
                i64::try_from(share)
                    .map(|share| share / self.increment * self.increment)
                    .map_err(|_| too_large())
            })
            .collect::<Result<Vec<i64>, ClockError>>()?;

        let paid = prizes
            .iter()
            .try_fold(0_i64, |total, prize| total.checked_add(*prize))
            .ok_or_else(too_large)?;
        let mut remainder = prize_pool.saturating_sub(paid);
        let places = prizes.len();
        let mut place = 0;
        while remainder > 0 && places > 0 {
            let delta = remainder.min(self.increment);
            if let Some(prize) = prizes.get_mut(place % places) {
                *prize += delta;
            }
            place += 1;
            remainder -= delta;
        }

        Ok(prizes)
    }

    fn find_row(&self, entrants: i64) -> Option<&[i64]> {
        self.rows
            .iter()
            .find(|row| entrants >= row.min_players && entrants <= row.max_players)
            .map(|row| row.percentages.as_slice())
            .filter(|percentages| !percentages.is_empty())
    }
}

/// Looks up paytables by id.
pub trait PaytableFetcher: Send + Sync + fmt::Debug {
    /// Returns the paytable with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] for an unknown id.
    fn fetch_paytable(&self, id: i64) -> Result<Paytable, ClockError>;
}

/// The paytables compiled into the server.
#[derive(Debug, Clone)]
pub struct BuiltinPaytables {
    tables: HashMap<i64, Paytable>,
}

impl BuiltinPaytables {
    /// Creates the catalogue with the unified BARGE table as id 1.
    #[must_use]
    pub fn new() -> Self {
        let barge = barge_paytable();
        Self {
            tables: HashMap::from([(barge.id, barge)]),
        }
    }
}

impl Default for BuiltinPaytables {
    fn default() -> Self {
        Self::new()
    }
}

impl PaytableFetcher for BuiltinPaytables {
    fn fetch_paytable(&self, id: i64) -> Result<Paytable, ClockError> {
        self.tables
            .get(&id)
            .cloned()
            .ok_or_else(|| ClockError::InvalidRequest(format!("no such paytable id {id}")))
    }
}

fn row(min_players: i64, max_players: i64, percentages: &[i64]) -> PaytableRow {
    PaytableRow {
        min_players,
        max_players,
        percentages: percentages.to_vec(),
    }
}

/// BARGE unified payouts; fewer than five entrants is winner take all.
fn barge_paytable() -> Paytable {
    Paytable {
        id: 1,
        name: "BARGE Unified Poker Payouts".to_string(),
        increment: 5,
        rows: vec![
            row(1, 4, &[10_000]),
            row(5, 8, &[6500, 3500]),
            row(9, 15, &[5000, 3000, 2000]),
            row(16, 24, &[4200, 2600, 1800, 1400]),
            row(25, 35, &[3600, 2400, 1700, 1300, 1000]),
            row(36, 47, &[3100, 2200, 1700, 1300, 1000, 700]),
            row(48, 55, &[2800, 2100, 1600, 1300, 1000, 700, 500]),
            row(56, 64, &[2700, 2000, 1600, 1200, 900, 700, 500, 400]),
            row(65, 72, &[2600, 1900, 1500, 1200, 900, 700, 500, 400, 300]),
            row(
                73,
                80,
                &[2500, 1900, 1400, 1100, 900, 700, 500, 400, 300, 300],
            ),
            row(
                81,
                96,
                &[2500, 1800, 1300, 1000, 800, 600, 500, 400, 300, 300, 250, 250],
            ),
            row(
                97,
                120,
                &[
                    2500, 1700, 1200, 900, 700, 600, 400, 300, 300, 300, 250, 250, 200, 200, 200,
                ],
            ),
            row(
                121,
                144,
                &[
                    2400, 1600, 1200, 900, 700, 500, 400, 300, 250, 250, 225, 225, 200, 200, 200,
                    150, 150, 150,
                ],
            ),
        ],
    }
}

/// Formats a finishing place: `1` → `"1st"`, `12` → `"12th"`, `22` → `"22nd"`.
#[must_use]
pub fn format_place(place: usize) -> String {
    let suffix = match (place % 10, place % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{place}{suffix}")
}

/// Renders payouts and saves as display lines.
///
/// Prizes come first (`"1st: $240"`); saves follow as a single line marked
/// with an asterisk and a trailing `"* save"` legend.
#[must_use]
pub fn render_prize_pool(prizes: &[i64], saves: i64, amount_per_save: i64) -> String {
    let mut lines: Vec<String> = prizes
        .iter()
        .enumerate()
        .map(|(i, prize)| format!("{}: ${prize}", format_place(i + 1)))
        .collect();

    if saves > 0 {
        let first = prizes.len() + 1;
        let last = first.saturating_add(usize::try_from(saves - 1).unwrap_or(0));
        if first == last {
            lines.push(format!("{}: ${amount_per_save}*", format_place(first)));
        } else {
            lines.push(format!(
                "{first}-{}: ${amount_per_save}*",
                format_place(last)
            ));
        }
        lines.push("* save".to_string());
    }

    lines.join("\n")
}
