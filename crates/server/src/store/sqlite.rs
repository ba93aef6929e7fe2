//! SQLite-backed store. WAL mode, schema migrations, one connection behind
//! a mutex: holding the lock across each read-modify-write gives the
//! per-key atomicity the traits require.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    Group, GroupMembership, GroupStore, Identity, IdentityStore, Member, MergedStats, StatsStore,
    StoreError,
};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database at `<data_dir>/focuslog.db`, creating it and
    /// running migrations as needed.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("focuslog.db");
        let conn = Connection::open(&db_path).context("opening SQLite database")?;
        Self::init(conn)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let migrations = vec![("0001_init", include_str!("../../migrations/0001_init.sql"))];

    for (name, sql) in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Opaque 32-hex identity token.
fn new_user_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 6-character uppercase hex group code candidate.
fn new_group_code() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_uppercase()
}

impl IdentityStore for SqliteStore {
    fn create_identity(&self, nickname: &str) -> Result<Identity, StoreError> {
        let conn = self.conn();

        let taken: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM users WHERE nickname = ?1",
                [nickname],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if taken {
            return Err(StoreError::Conflict("nickname already taken".into()));
        }

        let identity = Identity {
            user_id: new_user_id(),
            nickname: nickname.to_string(),
            created_at_ms: now_ms(),
        };
        conn.execute(
            "INSERT INTO users (id, nickname, created_at_ms) VALUES (?1, ?2, ?3)",
            params![identity.user_id, identity.nickname, identity.created_at_ms],
        )?;
        // Every identity starts with a zeroed stats row.
        conn.execute(
            "INSERT INTO stats (user_id) VALUES (?1)",
            [&identity.user_id],
        )?;
        Ok(identity)
    }

    fn identity(&self, user_id: &str) -> Result<Identity, StoreError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, nickname, created_at_ms FROM users WHERE id = ?1",
            [user_id],
            |row| {
                Ok(Identity {
                    user_id: row.get(0)?,
                    nickname: row.get(1)?,
                    created_at_ms: row.get(2)?,
                })
            },
        )
        .optional()?
        .ok_or(StoreError::NotFound("user"))
    }

    fn user_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }
}

impl GroupStore for SqliteStore {
    fn create_group(&self, name: &str, creator_id: &str) -> Result<Group, StoreError> {
        let conn = self.conn();

        let creator_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
                [creator_id],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if !creator_exists {
            return Err(StoreError::NotFound("user"));
        }

        // Draw codes until one is free; collisions are retried synchronously.
        let code = loop {
            let candidate = new_group_code();
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM groups WHERE code = ?1",
                    [&candidate],
                    |row| row.get(0),
                )
                .unwrap_or(false);
            if !exists {
                break candidate;
            }
        };

        conn.execute(
            "INSERT INTO groups (code, name, creator_id) VALUES (?1, ?2, ?3)",
            params![code, name, creator_id],
        )?;
        conn.execute(
            "INSERT INTO group_members (group_code, user_id, joined_at_ms) VALUES (?1, ?2, ?3)",
            params![code, creator_id, now_ms()],
        )?;

        Ok(Group {
            code,
            name: name.to_string(),
            creator_id: creator_id.to_string(),
        })
    }

    fn group(&self, code: &str) -> Result<Group, StoreError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT code, name, creator_id FROM groups WHERE code = ?1",
            [code],
            |row| {
                Ok(Group {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    creator_id: row.get(2)?,
                })
            },
        )
        .optional()?
        .ok_or(StoreError::NotFound("group"))
    }

    fn join_group(&self, user_id: &str, code: &str) -> Result<Group, StoreError> {
        let conn = self.conn();

        let user_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if !user_exists {
            return Err(StoreError::NotFound("user"));
        }

        let group = conn
            .query_row(
                "SELECT code, name, creator_id FROM groups WHERE code = ?1",
                [code],
                |row| {
                    Ok(Group {
                        code: row.get(0)?,
                        name: row.get(1)?,
                        creator_id: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound("group"))?;

        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM group_members WHERE group_code = ?1 AND user_id = ?2",
                params![code, user_id],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if already {
            return Err(StoreError::Conflict("already a member of this group".into()));
        }

        conn.execute(
            "INSERT INTO group_members (group_code, user_id, joined_at_ms) VALUES (?1, ?2, ?3)",
            params![code, user_id, now_ms()],
        )?;
        Ok(group)
    }

    fn leave_group(&self, user_id: &str, code: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();

        let tx = conn.transaction().map_err(StoreError::Storage)?;

        let group_exists: bool = tx
            .query_row(
                "SELECT COUNT(*) > 0 FROM groups WHERE code = ?1",
                [code],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if !group_exists {
            return Err(StoreError::NotFound("group"));
        }

        let removed = tx.execute(
            "DELETE FROM group_members WHERE group_code = ?1 AND user_id = ?2",
            params![code, user_id],
        )?;
        if removed == 0 {
            return Err(StoreError::Validation("not a member of this group".into()));
        }

        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM group_members WHERE group_code = ?1",
            [code],
            |row| row.get(0),
        )?;
        if remaining == 0 {
            tx.execute("DELETE FROM groups WHERE code = ?1", [code])?;
            tracing::info!("group {code} deleted (empty)");
        }

        tx.commit().map_err(StoreError::Storage)?;
        Ok(())
    }

    fn groups_of(&self, user_id: &str) -> Result<Vec<GroupMembership>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT g.code, g.name, \
                    (SELECT COUNT(*) FROM group_members m2 WHERE m2.group_code = g.code), \
                    g.creator_id = ?1 \
             FROM groups g \
             INNER JOIN group_members gm ON gm.group_code = g.code \
             WHERE gm.user_id = ?1 \
             ORDER BY gm.joined_at_ms",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(GroupMembership {
                code: row.get(0)?,
                name: row.get(1)?,
                member_count: row.get(2)?,
                is_creator: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn members(&self, code: &str) -> Result<Vec<Member>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.nickname \
             FROM group_members gm \
             INNER JOIN users u ON u.id = gm.user_id \
             WHERE gm.group_code = ?1 \
             ORDER BY gm.joined_at_ms, u.id",
        )?;
        let rows = stmt.query_map([code], |row| {
            Ok(Member {
                user_id: row.get(0)?,
                nickname: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn group_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM groups", [], |row| row.get(0))?)
    }
}

impl StatsStore for SqliteStore {
    fn merge_stats(
        &self,
        user_id: &str,
        learning_time: i64,
        distraction_time: i64,
        now_ms: i64,
    ) -> Result<MergedStats, StoreError> {
        let conn = self.conn();

        let user_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if !user_exists {
            return Err(StoreError::NotFound("user"));
        }

        let existing = read_stats(&conn, user_id)?.unwrap_or_default();

        // Monotonic merge: never lower a stored value, whatever order or
        // how often snapshots arrive.
        let merged = MergedStats {
            learning_time: existing.learning_time.max(learning_time),
            distraction_time: existing.distraction_time.max(distraction_time),
            last_updated_ms: now_ms,
        };

        conn.execute(
            "INSERT INTO stats (user_id, learning_time, distraction_time, last_updated_ms) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id) DO UPDATE SET \
                learning_time = excluded.learning_time, \
                distraction_time = excluded.distraction_time, \
                last_updated_ms = excluded.last_updated_ms",
            params![
                user_id,
                merged.learning_time,
                merged.distraction_time,
                merged.last_updated_ms
            ],
        )?;
        Ok(merged)
    }

    fn stats(&self, user_id: &str) -> Result<MergedStats, StoreError> {
        let conn = self.conn();
        Ok(read_stats(&conn, user_id)?.unwrap_or_default())
    }
}

fn read_stats(conn: &Connection, user_id: &str) -> Result<Option<MergedStats>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT learning_time, distraction_time, last_updated_ms FROM stats WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(MergedStats {
                    learning_time: row.get(0)?,
                    distraction_time: row.get(1)?,
                    last_updated_ms: row.get(2)?,
                })
            },
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn reopening_reapplies_no_migrations() {
        let dir = tempfile::tempdir().unwrap();
        {
            let s = SqliteStore::open(dir.path()).unwrap();
            s.create_identity("nico").unwrap();
        }
        // Second open must find the schema already migrated.
        let s = SqliteStore::open(dir.path()).unwrap();
        assert_eq!(s.user_count().unwrap(), 1);
    }

    #[test]
    fn register_rejects_duplicate_nickname() {
        let s = store();
        let a = s.create_identity("nico").unwrap();
        assert_eq!(a.user_id.len(), 32);
        assert!(a.created_at_ms > 0);

        let err = s.create_identity("nico").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // A distinct nickname still works; names are case-sensitive.
        s.create_identity("Nico").unwrap();
        assert_eq!(s.user_count().unwrap(), 2);
    }

    #[test]
    fn registration_seeds_zeroed_stats() {
        let s = store();
        let user = s.create_identity("nico").unwrap();
        assert_eq!(s.stats(&user.user_id).unwrap(), MergedStats::default());
    }

    #[test]
    fn group_codes_are_six_uppercase_hex() {
        let s = store();
        let user = s.create_identity("nico").unwrap();
        let group = s.create_group("study", &user.user_id).unwrap();
        assert_eq!(group.code.len(), 6);
        assert!(group.code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn join_and_leave_lifecycle() {
        let s = store();
        let a = s.create_identity("a").unwrap();
        let b = s.create_identity("b").unwrap();
        let group = s.create_group("study", &a.user_id).unwrap();
        assert_eq!(group.creator_id, a.user_id);

        s.join_group(&b.user_id, &group.code).unwrap();
        let err = s.join_group(&b.user_id, &group.code).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let members = s.members(&group.code).unwrap();
        assert_eq!(members.len(), 2);
        // Joined-at order: creator first.
        assert_eq!(members[0].user_id, a.user_id);

        let memberships = s.groups_of(&b.user_id).unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].member_count, 2);
        assert!(!memberships[0].is_creator);

        let err = s.leave_group("nobody", &group.code).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        s.leave_group(&b.user_id, &group.code).unwrap();
        assert_eq!(s.members(&group.code).unwrap().len(), 1);
    }

    #[test]
    fn empty_group_is_deleted() {
        let s = store();
        let a = s.create_identity("a").unwrap();
        let group = s.create_group("study", &a.user_id).unwrap();

        s.leave_group(&a.user_id, &group.code).unwrap();
        assert!(matches!(
            s.group(&group.code).unwrap_err(),
            StoreError::NotFound("group")
        ));
        assert!(matches!(
            s.join_group(&a.user_id, &group.code).unwrap_err(),
            StoreError::NotFound("group")
        ));
        assert_eq!(s.group_count().unwrap(), 0);
    }

    #[test]
    fn merge_is_monotonic_under_out_of_order_pushes() {
        let s = store();
        let user = s.create_identity("nico").unwrap();

        let m1 = s.merge_stats(&user.user_id, 600, 120, 1_000).unwrap();
        assert_eq!((m1.learning_time, m1.distraction_time), (600, 120));

        // A stale, smaller snapshot never lowers the stored values.
        let m2 = s.merge_stats(&user.user_id, 300, 40, 2_000).unwrap();
        assert_eq!((m2.learning_time, m2.distraction_time), (600, 120));
        assert_eq!(m2.last_updated_ms, 2_000);

        // A larger one raises them.
        let m3 = s.merge_stats(&user.user_id, 900, 100, 3_000).unwrap();
        assert_eq!((m3.learning_time, m3.distraction_time), (900, 120));

        assert_eq!(s.stats(&user.user_id).unwrap(), m3);
    }

    #[test]
    fn merge_requires_existing_identity() {
        let s = store();
        assert!(matches!(
            s.merge_stats("ghost", 1, 1, 0).unwrap_err(),
            StoreError::NotFound("user")
        ));
    }

    #[test]
    fn stats_default_to_zero_for_unsynced_user() {
        let s = store();
        assert_eq!(s.stats("ghost").unwrap(), MergedStats::default());
    }
}
