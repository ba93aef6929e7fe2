//! Local SQLite database for the tracker daemon.
//!
//! Holds everything the client persists: the append-only session log, the
//! per-day and per-day-per-hour totals, the rank-1 history, and a small KV
//! area (last alert timestamp, cached motivation, registered identity).
//!
//! Thread-safe: wraps the connection in a Mutex so it can be shared via
//! `Arc<LocalDb>`. Holding the lock across each read-modify-write keeps at
//! most one aggregator mutation in flight.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

use focuslog_core::aggregate::{CategoryTotals, DayTotals};
use focuslog_core::civil;
use focuslog_core::classify::Category;
use focuslog_core::tracker::Session;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    hostname TEXT NOT NULL,
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    duration_seconds INTEGER NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    date TEXT NOT NULL,
    hour INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);

CREATE TABLE IF NOT EXISTS daily_totals (
    date TEXT PRIMARY KEY,
    learning INTEGER NOT NULL DEFAULT 0,
    distraction INTEGER NOT NULL DEFAULT 0,
    mixed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS hourly_totals (
    date TEXT NOT NULL,
    hour INTEGER NOT NULL,
    learning INTEGER NOT NULL DEFAULT 0,
    distraction INTEGER NOT NULL DEFAULT 0,
    mixed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (date, hour)
);

CREATE TABLE IF NOT EXISTS rank_history (
    group_code TEXT NOT NULL,
    date TEXT NOT NULL,
    PRIMARY KEY (group_code, date)
);

CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Registered identity stored client-side after `/user/register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredUser {
    pub user_id: String,
    pub nickname: String,
}

pub struct LocalDb {
    conn: Mutex<Connection>,
}

impl LocalDb {
    /// Open (or create) the local database at the default path,
    /// `~/.local/share/focuslog/local.db`.
    pub fn open() -> Result<Self> {
        let path = default_db_path()?;
        Self::open_path(&path)
    }

    /// Open (or create) the local database at a specific path.
    pub fn open_path(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", path.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("local db mutex poisoned")
    }

    // ── Aggregator: record + prune ─────────────────────────────────────

    /// Record one closed session: append to the log, upsert the day and
    /// hour buckets, then prune everything older than the retention window
    /// relative to `today`. One transaction; pruning runs on every call.
    pub fn record_session(&self, session: &Session, today: NaiveDate) -> Result<()> {
        let date = civil::date_string(session.date);
        let (l, d, m) = category_deltas(session.category, session.duration_seconds);

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO sessions (url, hostname, title, category, duration_seconds, timestamp_ms, date, hour) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.url,
                session.hostname,
                session.title,
                session.category.as_str(),
                session.duration_seconds,
                session.timestamp_ms,
                date,
                session.hour as i64,
            ],
        )?;

        tx.execute(
            "INSERT INTO daily_totals (date, learning, distraction, mixed) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(date) DO UPDATE SET \
                learning = learning + excluded.learning, \
                distraction = distraction + excluded.distraction, \
                mixed = mixed + excluded.mixed",
            params![date, l, d, m],
        )?;

        tx.execute(
            "INSERT INTO hourly_totals (date, hour, learning, distraction, mixed) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(date, hour) DO UPDATE SET \
                learning = learning + excluded.learning, \
                distraction = distraction + excluded.distraction, \
                mixed = mixed + excluded.mixed",
            params![date, session.hour as i64, l, d, m],
        )?;

        prune_tx(&tx, today)?;
        tx.commit()?;
        Ok(())
    }

    /// Drop sessions and buckets older than the retention window. Already
    /// runs inside every [`record_session`]; exposed for startup sweeps.
    pub fn prune(&self, today: NaiveDate) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        prune_tx(&tx, today)?;
        tx.commit()?;
        Ok(())
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// Category totals for one civil date (zeros when absent).
    pub fn day_totals(&self, date: NaiveDate) -> Result<CategoryTotals> {
        let conn = self.conn();
        let totals = conn
            .query_row(
                "SELECT learning, distraction, mixed FROM daily_totals WHERE date = ?1",
                [civil::date_string(date)],
                |row| {
                    Ok(CategoryTotals {
                        learning: row.get(0)?,
                        distraction: row.get(1)?,
                        mixed: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(totals.unwrap_or_default())
    }

    /// One day's totals with hourly sub-buckets.
    pub fn day(&self, date: NaiveDate) -> Result<DayTotals> {
        let mut day = DayTotals {
            totals: self.day_totals(date)?,
            hourly: Default::default(),
        };
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT hour, learning, distraction, mixed FROM hourly_totals WHERE date = ?1 ORDER BY hour",
        )?;
        let rows = stmt.query_map([civil::date_string(date)], |row| {
            Ok((
                row.get::<_, i64>(0)? as u8,
                CategoryTotals {
                    learning: row.get(1)?,
                    distraction: row.get(2)?,
                    mixed: row.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (hour, totals) = row?;
            day.hourly.insert(hour, totals);
        }
        Ok(day)
    }

    /// Summed category totals over an inclusive date range.
    pub fn range_totals(&self, from: NaiveDate, to: NaiveDate) -> Result<CategoryTotals> {
        let conn = self.conn();
        let totals = conn.query_row(
            "SELECT COALESCE(SUM(learning), 0), COALESCE(SUM(distraction), 0), COALESCE(SUM(mixed), 0) \
             FROM daily_totals WHERE date >= ?1 AND date <= ?2",
            [civil::date_string(from), civil::date_string(to)],
            |row| {
                Ok(CategoryTotals {
                    learning: row.get(0)?,
                    distraction: row.get(1)?,
                    mixed: row.get(2)?,
                })
            },
        )?;
        Ok(totals)
    }

    /// Learning seconds per hour-of-day over an inclusive date range,
    /// for best-study-hour analysis.
    pub fn learning_by_hour(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<(u8, i64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT hour, COALESCE(SUM(learning), 0) FROM hourly_totals \
             WHERE date >= ?1 AND date <= ?2 GROUP BY hour ORDER BY hour",
        )?;
        let rows = stmt.query_map(
            [civil::date_string(from), civil::date_string(to)],
            |row| Ok((row.get::<_, i64>(0)? as u8, row.get::<_, i64>(1)?)),
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All session rows for one date, oldest first. Test and export aid.
    pub fn sessions_on(&self, date: NaiveDate) -> Result<Vec<Session>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT url, hostname, title, category, duration_seconds, timestamp_ms, date, hour \
             FROM sessions WHERE date = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([civil::date_string(date)], session_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Distinct dates still present in the daily buckets, ascending.
    pub fn bucket_dates(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT date FROM daily_totals ORDER BY date")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn session_count(&self) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    // ── Rank history ───────────────────────────────────────────────────

    /// Record that we held rank 1 in `group_code` on `date`. Idempotent.
    pub fn record_rank_win(&self, group_code: &str, date: NaiveDate) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO rank_history (group_code, date) VALUES (?1, ?2)",
            params![group_code, civil::date_string(date)],
        )?;
        Ok(())
    }

    /// Number of distinct dates we were observed at rank 1.
    pub fn rank_win_count(&self, group_code: &str) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM rank_history WHERE group_code = ?1",
            [group_code],
            |row| row.get(0),
        )?)
    }

    // ── KV area ────────────────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        Ok(conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn last_alert_ms(&self) -> Result<i64> {
        Ok(self
            .kv_get("last_alert_ms")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub fn set_last_alert_ms(&self, ms: i64) -> Result<()> {
        self.kv_set("last_alert_ms", &ms.to_string())
    }

    /// Cached motivation message for `date`, if still fresh.
    pub fn motivation_for(&self, date: NaiveDate) -> Result<Option<String>> {
        let cached_date = self.kv_get("motivation_date")?;
        if cached_date.as_deref() == Some(civil::date_string(date).as_str()) {
            return self.kv_get("daily_motivation");
        }
        Ok(None)
    }

    pub fn set_motivation(&self, date: NaiveDate, message: &str) -> Result<()> {
        self.kv_set("motivation_date", &civil::date_string(date))?;
        self.kv_set("daily_motivation", message)
    }

    pub fn user(&self) -> Result<Option<RegisteredUser>> {
        let user_id = self.kv_get("user_id")?;
        let nickname = self.kv_get("nickname")?;
        Ok(match (user_id, nickname) {
            (Some(user_id), Some(nickname)) => Some(RegisteredUser { user_id, nickname }),
            _ => None,
        })
    }

    pub fn set_user(&self, user: &RegisteredUser) -> Result<()> {
        self.kv_set("user_id", &user.user_id)?;
        self.kv_set("nickname", &user.nickname)
    }
}

fn prune_tx(tx: &rusqlite::Transaction<'_>, today: NaiveDate) -> Result<()> {
    let cutoff = civil::date_string(civil::retention_cutoff(today));
    tx.execute("DELETE FROM sessions WHERE date < ?1", [&cutoff])?;
    tx.execute("DELETE FROM daily_totals WHERE date < ?1", [&cutoff])?;
    tx.execute("DELETE FROM hourly_totals WHERE date < ?1", [&cutoff])?;
    Ok(())
}

fn category_deltas(category: Category, seconds: i64) -> (i64, i64, i64) {
    match category {
        Category::Learning => (seconds, 0, 0),
        Category::Distraction => (0, seconds, 0),
        Category::Mixed => (0, 0, seconds),
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let category: String = row.get(3)?;
    let date: String = row.get(6)?;
    Ok(Session {
        url: row.get(0)?,
        hostname: row.get(1)?,
        title: row.get(2)?,
        category: category.parse().unwrap_or(Category::Mixed),
        duration_seconds: row.get(4)?,
        timestamp_ms: row.get(5)?,
        date: date
            .parse()
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date")),
        hour: row.get::<_, i64>(7)? as u8,
    })
}

/// Default database location, `~/.local/share/focuslog/local.db`.
fn default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("focuslog")
        .join("local.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use focuslog_core::aggregate::fold_sessions;

    fn open_temp() -> (tempfile::TempDir, LocalDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = LocalDb::open_path(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn session(date: NaiveDate, hour: u8, category: Category, secs: i64) -> Session {
        Session {
            url: format!("https://example.com/{hour}"),
            hostname: "example.com".into(),
            title: "t".into(),
            category,
            duration_seconds: secs,
            timestamp_ms: 1_700_000_000_000,
            date,
            hour,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn record_matches_reference_fold() {
        let (_dir, db) = open_temp();
        let today = d(2024, 3, 11);
        let sessions = vec![
            session(today, 9, Category::Learning, 120),
            session(today, 9, Category::Distraction, 30),
            session(today, 14, Category::Learning, 60),
            session(today, 23, Category::Mixed, 45),
        ];
        for s in &sessions {
            db.record_session(s, today).unwrap();
        }

        let expected = &fold_sessions(&sessions)[&today];
        let day = db.day(today).unwrap();
        assert_eq!(&day, expected);
        // Exact accounting: total equals the sum of durations.
        assert_eq!(day.totals.total(), 255);
    }

    #[test]
    fn pruning_drops_old_dates_and_is_idempotent() {
        let (_dir, db) = open_temp();
        let today = d(2024, 3, 31);
        let old = d(2024, 2, 1); // before the 30-day cutoff
        let recent = d(2024, 3, 15);

        db.record_session(&session(old, 9, Category::Learning, 100), old)
            .unwrap();
        db.record_session(&session(recent, 9, Category::Learning, 100), recent)
            .unwrap();
        assert_eq!(db.session_count().unwrap(), 2);

        // Recording anything "today" prunes the stale date.
        db.record_session(&session(today, 10, Category::Mixed, 50), today)
            .unwrap();
        assert_eq!(db.session_count().unwrap(), 2);
        assert_eq!(
            db.bucket_dates().unwrap(),
            vec!["2024-03-15".to_string(), "2024-03-31".to_string()]
        );

        // Running prune again changes nothing.
        db.prune(today).unwrap();
        db.prune(today).unwrap();
        assert_eq!(db.session_count().unwrap(), 2);
        assert_eq!(db.bucket_dates().unwrap().len(), 2);
        assert_eq!(db.day_totals(old).unwrap(), CategoryTotals::default());
    }

    #[test]
    fn range_and_hourly_queries() {
        let (_dir, db) = open_temp();
        let today = d(2024, 3, 11);
        db.record_session(&session(d(2024, 3, 10), 9, Category::Learning, 100), today)
            .unwrap();
        db.record_session(&session(today, 9, Category::Learning, 50), today)
            .unwrap();
        db.record_session(&session(today, 14, Category::Distraction, 30), today)
            .unwrap();

        let range = db.range_totals(d(2024, 3, 10), today).unwrap();
        assert_eq!(range.learning, 150);
        assert_eq!(range.distraction, 30);

        let by_hour = db.learning_by_hour(d(2024, 3, 10), today).unwrap();
        assert_eq!(by_hour, vec![(9, 150), (14, 0)]);
    }

    #[test]
    fn sessions_round_trip() {
        let (_dir, db) = open_temp();
        let today = d(2024, 3, 11);
        let s = session(today, 9, Category::Distraction, 75);
        db.record_session(&s, today).unwrap();
        assert_eq!(db.sessions_on(today).unwrap(), vec![s]);
    }

    #[test]
    fn rank_history_counts_distinct_dates() {
        let (_dir, db) = open_temp();
        db.record_rank_win("A1B2C3", d(2024, 3, 10)).unwrap();
        db.record_rank_win("A1B2C3", d(2024, 3, 10)).unwrap();
        db.record_rank_win("A1B2C3", d(2024, 3, 11)).unwrap();
        db.record_rank_win("FFFFFF", d(2024, 3, 11)).unwrap();
        assert_eq!(db.rank_win_count("A1B2C3").unwrap(), 2);
        assert_eq!(db.rank_win_count("FFFFFF").unwrap(), 1);
        assert_eq!(db.rank_win_count("000000").unwrap(), 0);
    }

    #[test]
    fn kv_and_identity() {
        let (_dir, db) = open_temp();
        assert_eq!(db.last_alert_ms().unwrap(), 0);
        db.set_last_alert_ms(123_456).unwrap();
        assert_eq!(db.last_alert_ms().unwrap(), 123_456);

        assert!(db.user().unwrap().is_none());
        let user = RegisteredUser {
            user_id: "abc123".into(),
            nickname: "nico".into(),
        };
        db.set_user(&user).unwrap();
        assert_eq!(db.user().unwrap(), Some(user));
    }

    #[test]
    fn motivation_cache_is_keyed_by_date() {
        let (_dir, db) = open_temp();
        let today = d(2024, 3, 11);
        assert!(db.motivation_for(today).unwrap().is_none());
        db.set_motivation(today, "Keep going!").unwrap();
        assert_eq!(
            db.motivation_for(today).unwrap().as_deref(),
            Some("Keep going!")
        );
        // A new day invalidates the cache.
        assert!(db.motivation_for(d(2024, 3, 12)).unwrap().is_none());
    }
}
