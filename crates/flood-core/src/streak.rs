//! Calendar-day streak arithmetic.
//!
//! A streak counts consecutive days on which some per-day qualifying
//! predicate held. The same rules serve puzzle-completion, first-try and
//! tie/beat-bot streaks; callers decide what qualifies.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
    /// Last day on which the predicate held.
    pub last_day: Option<NaiveDate>,
}

impl Streak {
    /// The predicate held on `day`. Same day as the last qualifying one is
    /// a no-op; the day after extends the run; a forward gap starts over at
    /// 1. Days before `last_day` are ignored outright: solving an older
    /// puzzle late must not rewind the run.
    pub fn record_qualifying(&mut self, day: NaiveDate) {
        match self.last_day {
            Some(prev) if prev > day => return,
            Some(prev) if prev == day => {}
            Some(prev) if prev.succ_opt() == Some(day) => self.current += 1,
            _ => self.current = 1,
        }
        self.longest = self.longest.max(self.current);
        self.last_day = Some(day);
    }

    /// The predicate failed on `day`. Drops the running count unless the
    /// day (or a later one) already qualified; `longest` and `last_day`
    /// are untouched.
    pub fn record_non_qualifying(&mut self, day: NaiveDate) {
        if self.last_day.is_none_or(|prev| prev < day) {
            self.current = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn consecutive_days_extend() {
        let mut s = Streak::default();
        s.record_qualifying(day("2025-03-01"));
        s.record_qualifying(day("2025-03-02"));
        assert_eq!(s.current, 2);
        assert!(s.longest >= 2);
    }

    #[test]
    fn gap_resets_to_one() {
        let mut s = Streak::default();
        s.record_qualifying(day("2025-03-01"));
        s.record_qualifying(day("2025-03-04"));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 1);
    }

    #[test]
    fn same_day_twice_unchanged() {
        let mut s = Streak::default();
        s.record_qualifying(day("2025-03-01"));
        s.record_qualifying(day("2025-03-02"));
        let before = s;
        s.record_qualifying(day("2025-03-02"));
        assert_eq!(s, before);
    }

    #[test]
    fn non_qualifying_new_day_drops_current() {
        let mut s = Streak::default();
        s.record_qualifying(day("2025-03-01"));
        s.record_qualifying(day("2025-03-02"));
        s.record_non_qualifying(day("2025-03-03"));
        assert_eq!(s.current, 0);
        assert_eq!(s.longest, 2);
        assert_eq!(s.last_day, Some(day("2025-03-02")));
    }

    #[test]
    fn non_qualifying_same_day_is_ignored() {
        let mut s = Streak::default();
        s.record_qualifying(day("2025-03-01"));
        s.record_non_qualifying(day("2025-03-01"));
        assert_eq!(s.current, 1);
    }

    #[test]
    fn earlier_days_never_rewind_the_run() {
        let mut s = Streak::default();
        s.record_qualifying(day("2025-05-01"));
        s.record_qualifying(day("2025-05-02"));
        s.record_qualifying(day("2025-04-20"));
        assert_eq!(s.current, 2);
        assert_eq!(s.last_day, Some(day("2025-05-02")));

        s.record_non_qualifying(day("2025-04-21"));
        assert_eq!(s.current, 2);
    }

    #[test]
    fn longest_survives_resets() {
        let mut s = Streak::default();
        for d in ["2025-03-01", "2025-03-02", "2025-03-03"] {
            s.record_qualifying(day(d));
        }
        s.record_qualifying(day("2025-03-10"));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 3);
    }
}
