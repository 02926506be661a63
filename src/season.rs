//! Broadcast seasons and the calendar arithmetic built on them.
//!
//! Anime listings are grouped into four seasons per year. Each season starts on
//! a fixed month:
//!
//! | Season | Months    | Label |
//! |--------|-----------|-------|
//! | Winter | Jan – Mar | 冬    |
//! | Spring | Apr – Jun | 春    |
//! | Summer | Jul – Sep | 夏    |
//! | Fall   | Oct – Dec | 秋    |
//!
//! A season is always keyed under the calendar year in which it starts, so
//! winter 2024 is January through March 2024.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four broadcast seasons, ordered as they occur in a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// All seasons in calendar order.
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// Month (1-based) in which the season starts.
    pub fn start_month(self) -> u32 {
        match self {
            Season::Winter => 1,
            Season::Spring => 4,
            Season::Summer => 7,
            Season::Fall => 10,
        }
    }

    /// Season containing `month` (1-based).
    pub fn from_month(month: u32) -> Season {
        match month {
            1..=3 => Season::Winter,
            4..=6 => Season::Spring,
            7..=9 => Season::Summer,
            _ => Season::Fall,
        }
    }

    /// Single-character label the listing site uses in its page titles.
    pub fn label(self) -> &'static str {
        match self {
            Season::Winter => "冬",
            Season::Spring => "春",
            Season::Summer => "夏",
            Season::Fall => "秋",
        }
    }

    /// Lowercase English name, matching the catalog keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }

    fn index(self) -> i32 {
        match self {
            Season::Winter => 0,
            Season::Spring => 1,
            Season::Summer => 2,
            Season::Fall => 3,
        }
    }

    /// The season before `(year, self)`, crossing into the previous year after winter.
    pub fn previous(self, year: i32) -> (i32, Season) {
        match self {
            Season::Winter => (year - 1, Season::Fall),
            other => (year, Season::ALL[(other.index() - 1) as usize]),
        }
    }

    /// Whether `(year, self)` has begun as of `today`.
    pub fn has_started(self, year: i32, today: NaiveDate) -> bool {
        match year.cmp(&today.year()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => today.month() >= self.start_month(),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every `(year, season)` from winter of `start_year` up to the current season.
///
/// Seasons that have not started as of `today` are left out, so in March only
/// the current year's winter is included.
pub fn backfill_seasons(start_year: i32, today: NaiveDate) -> Vec<(i32, Season)> {
    (start_year..=today.year())
        .flat_map(|year| Season::ALL.into_iter().map(move |season| (year, season)))
        .filter(|(year, season)| season.has_started(*year, today))
        .collect()
}

/// The `count` most recent seasons, newest first, starting with the one containing `today`.
pub fn recent_seasons(count: usize, today: NaiveDate) -> Vec<(i32, Season)> {
    let current = (today.year(), Season::from_month(today.month()));
    std::iter::successors(Some(current), |(year, season)| Some(season.previous(*year)))
        .take(count)
        .collect()
}
