//! Bucketed time totals and the reference aggregation fold.
//!
//! The durable aggregator lives in `focuslog-local-db`, which upserts these
//! buckets transactionally per recorded session. [`fold_sessions`] is the
//! reference fold used to state the exact-accounting invariant: per-date
//! category totals always equal the sum of that date's session durations.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classify::Category;
use crate::tracker::Session;

/// Seconds per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub learning: i64,
    pub distraction: i64,
    pub mixed: i64,
}

impl CategoryTotals {
    pub fn add(&mut self, category: Category, seconds: i64) {
        match category {
            Category::Learning => self.learning += seconds,
            Category::Distraction => self.distraction += seconds,
            Category::Mixed => self.mixed += seconds,
        }
    }

    pub fn merge(&mut self, other: &CategoryTotals) {
        self.learning += other.learning;
        self.distraction += other.distraction;
        self.mixed += other.mixed;
    }

    pub fn total(&self) -> i64 {
        self.learning + self.distraction + self.mixed
    }
}

/// One day's totals: per-category seconds plus per-hour sub-buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTotals {
    #[serde(flatten)]
    pub totals: CategoryTotals,
    pub hourly: BTreeMap<u8, CategoryTotals>,
}

impl DayTotals {
    pub fn record(&mut self, category: Category, hour: u8, seconds: i64) {
        self.totals.add(category, seconds);
        self.hourly.entry(hour).or_default().add(category, seconds);
    }
}

/// Fold closed sessions into per-date buckets.
pub fn fold_sessions<'a>(
    sessions: impl IntoIterator<Item = &'a Session>,
) -> BTreeMap<NaiveDate, DayTotals> {
    let mut daily = BTreeMap::new();
    for s in sessions {
        daily
            .entry(s.date)
            .or_insert_with(DayTotals::default)
            .record(s.category, s.hour, s.duration_seconds);
    }
    daily
}

/// Hour of day with the most accumulated learning seconds; ties resolve to
/// the earliest hour, and hours with zero learning never win.
pub fn best_learning_hour(hours: impl IntoIterator<Item = (u8, i64)>) -> Option<u8> {
    let mut best: Option<(u8, i64)> = None;
    for (hour, learning) in hours {
        if learning <= 0 {
            continue;
        }
        match best {
            Some((_, top)) if learning <= top => {}
            _ => best = Some((hour, learning)),
        }
    }
    best.map(|(hour, _)| hour)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(date: (i32, u32, u32), hour: u8, category: Category, secs: i64) -> Session {
        Session {
            url: "https://example.com".into(),
            hostname: "example.com".into(),
            title: "t".into(),
            category,
            duration_seconds: secs,
            timestamp_ms: 0,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            hour,
        }
    }

    #[test]
    fn fold_accounts_exactly() {
        let sessions = vec![
            session((2024, 3, 11), 9, Category::Learning, 120),
            session((2024, 3, 11), 9, Category::Distraction, 30),
            session((2024, 3, 11), 14, Category::Learning, 60),
            session((2024, 3, 12), 10, Category::Mixed, 45),
        ];
        let daily = fold_sessions(&sessions);

        let d1 = &daily[&NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()];
        assert_eq!(d1.totals.learning, 180);
        assert_eq!(d1.totals.distraction, 30);
        assert_eq!(d1.totals.mixed, 0);
        // Sum over all categories equals the sum of session durations.
        assert_eq!(d1.totals.total(), 210);
        assert_eq!(d1.hourly[&9].learning, 120);
        assert_eq!(d1.hourly[&9].distraction, 30);
        assert_eq!(d1.hourly[&14].learning, 60);

        let d2 = &daily[&NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()];
        assert_eq!(d2.totals.total(), 45);
    }

    #[test]
    fn hourly_sums_match_day_totals() {
        let sessions = vec![
            session((2024, 3, 11), 9, Category::Learning, 100),
            session((2024, 3, 11), 10, Category::Learning, 50),
            session((2024, 3, 11), 10, Category::Distraction, 25),
        ];
        let daily = fold_sessions(&sessions);
        let day = &daily[&NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()];
        let mut hourly_sum = CategoryTotals::default();
        for totals in day.hourly.values() {
            hourly_sum.merge(totals);
        }
        assert_eq!(hourly_sum, day.totals);
    }

    #[test]
    fn best_hour_prefers_most_learning() {
        let hours = vec![(9u8, 120i64), (14, 300), (22, 60)];
        assert_eq!(best_learning_hour(hours), Some(14));
    }

    #[test]
    fn best_hour_ignores_zero_and_handles_empty() {
        assert_eq!(best_learning_hour(vec![(9u8, 0i64), (10, 0)]), None);
        assert_eq!(best_learning_hour(Vec::<(u8, i64)>::new()), None);
    }

    #[test]
    fn best_hour_tie_resolves_to_earliest() {
        let hours = vec![(8u8, 100i64), (20, 100)];
        assert_eq!(best_learning_hour(hours), Some(8));
    }
}
