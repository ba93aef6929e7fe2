//! Civil date/hour bucketing in one fixed UTC offset.
//!
//! Every device bucketizes with the same offset, so date boundaries are
//! identical across timezones. The offset is UTC+05:30, matching the
//! deployment the stats are calibrated for.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

/// Seconds east of UTC for all civil bucketing: +05:30.
pub const CIVIL_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Days of session/aggregate history kept locally.
pub const RETENTION_DAYS: i64 = 30;

fn civil_offset() -> FixedOffset {
    FixedOffset::east_opt(CIVIL_OFFSET_SECS).expect("valid fixed offset")
}

fn to_civil(ts_ms: i64) -> DateTime<FixedOffset> {
    let utc = Utc
        .timestamp_millis_opt(ts_ms)
        .single()
        .unwrap_or_else(Utc::now);
    utc.with_timezone(&civil_offset())
}

/// Calendar date and hour-of-day of an instant, in the fixed civil offset.
pub fn civil_date_hour(ts_ms: i64) -> (NaiveDate, u8) {
    let t = to_civil(ts_ms);
    (t.date_naive(), t.hour() as u8)
}

/// Calendar date of an instant, in the fixed civil offset.
pub fn civil_date(ts_ms: i64) -> NaiveDate {
    civil_date_hour(ts_ms).0
}

/// `YYYY-MM-DD` string for wire and storage keys.
pub fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Oldest date (inclusive) still retained given today's civil date.
pub fn retention_cutoff(today: NaiveDate) -> NaiveDate {
    today - chrono::Duration::days(RETENTION_DAYS)
}
