//! Rolling score windows over a day-keyed map.
//!
//! The per-user aggregate stores one best total score per active day,
//! keyed by a `YYYY-M-D` date string. The stored all-time / last-30 /
//! last-7 sums are caches only; anything that needs a trustworthy value
//! recomputes from the map with the rules here.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

/// One best total score per active day. String-keyed on purpose: legacy
/// data contains keys that are date-shaped but not valid dates.
pub type DayMap = BTreeMap<String, i64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingSums {
    pub all_time: i64,
    pub last_30: i64,
    pub last_7: i64,
}

/// How a day key participates in the sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKey {
    /// Not three `-`-separated parts: contributes nothing.
    Invalid,
    /// Three parts but not a real calendar date: all-time only.
    AllTimeOnly,
    /// A valid date: all-time plus whichever windows cover it.
    Day(NaiveDate),
}

pub fn parse_day_key(key: &str) -> DayKey {
    if key.split('-').count() != 3 {
        return DayKey::Invalid;
    }
    match NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        Ok(date) => DayKey::Day(date),
        Err(_) => DayKey::AllTimeOnly,
    }
}

/// Canonical key for a date (zero-padded, so keys sort chronologically).
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Recompute all three windows from the full map. `today` is the UTC
/// calendar date; last-7 covers `today - 6 ..= today`, last-30 covers
/// `today - 29 ..= today`.
pub fn windowed_sums(days: &DayMap, today: NaiveDate) -> RollingSums {
    let cut_7 = today - Days::new(6);
    let cut_30 = today - Days::new(29);

    let mut sums = RollingSums::default();
    for (key, value) in days {
        match parse_day_key(key) {
            DayKey::Invalid => {}
            DayKey::AllTimeOnly => sums.all_time += value,
            DayKey::Day(date) => {
                sums.all_time += value;
                if date >= cut_30 {
                    sums.last_30 += value;
                }
                if date >= cut_7 {
                    sums.last_7 += value;
                }
            }
        }
    }
    sums
}
