//! Persistence boundary for the server.
//!
//! All handlers talk to these traits, never to a concrete database, so a
//! transactional document store and a durable file/KV store are equally
//! valid backings. The SQLite implementation in [`sqlite`] is the default.
//! Implementations must serialize read-modify-write sequences per key: the
//! monotonic merge and the membership invariants both depend on it.

mod sqlite;

pub use sqlite::SqliteStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// A registered identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub nickname: String,
    pub created_at_ms: i64,
}

/// A group record. A group with zero members does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub code: String,
    pub name: String,
    pub creator_id: String,
}

/// Group listing row for one member's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    pub code: String,
    pub name: String,
    pub member_count: i64,
    pub is_creator: bool,
}

/// A group member, in joined-at order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    pub nickname: String,
}

/// Merged per-identity totals. Only ever raised, never lowered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergedStats {
    pub learning_time: i64,
    pub distraction_time: i64,
    pub last_updated_ms: i64,
}

pub trait IdentityStore {
    /// Create an identity with a fresh opaque id. The nickname must be
    /// unique (case-sensitive); duplicates are a conflict.
    fn create_identity(&self, nickname: &str) -> Result<Identity, StoreError>;

    fn identity(&self, user_id: &str) -> Result<Identity, StoreError>;

    fn user_count(&self) -> Result<i64, StoreError>;
}

pub trait GroupStore {
    /// Create a group with a fresh unique 6-hex-char code; the creator
    /// becomes the first member.
    fn create_group(&self, name: &str, creator_id: &str) -> Result<Group, StoreError>;

    fn group(&self, code: &str) -> Result<Group, StoreError>;

    /// Join an existing group. Already-member is a conflict.
    fn join_group(&self, user_id: &str, code: &str) -> Result<Group, StoreError>;

    /// Leave a group; deletes the group atomically when the last member
    /// departs. Not-a-member is a validation error.
    fn leave_group(&self, user_id: &str, code: &str) -> Result<(), StoreError>;

    /// Groups the user belongs to, oldest joined first.
    fn groups_of(&self, user_id: &str) -> Result<Vec<GroupMembership>, StoreError>;

    /// Members of a group in joined-at order. This order is the leaderboard
    /// tie-break.
    fn members(&self, code: &str) -> Result<Vec<Member>, StoreError>;

    fn group_count(&self) -> Result<i64, StoreError>;
}

pub trait StatsStore {
    /// Monotonic merge: the stored totals become the max of the existing
    /// and incoming values. Requires the identity to exist.
    fn merge_stats(
        &self,
        user_id: &str,
        learning_time: i64,
        distraction_time: i64,
        now_ms: i64,
    ) -> Result<MergedStats, StoreError>;

    /// Current merged totals, zeros when never synced.
    fn stats(&self, user_id: &str) -> Result<MergedStats, StoreError>;
}

/// The full persistence surface the server needs.
pub trait Store: IdentityStore + GroupStore + StatsStore + Send + Sync {}

impl<T: IdentityStore + GroupStore + StatsStore + Send + Sync> Store for T {}
