//! Shared API types for focuslog
//!
//! This crate is the **single source of truth** for all API request/response
//! types. The server (Axum) and the tracker daemon import these types
//! directly. TypeScript types for the extension popup are auto-generated via
//! `ts-rs`.
//!
//! To regenerate TypeScript types:
//!   cargo test -p focuslog-api-types -- export_typescript --nocapture

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct RegisterRequest {
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserInfo {
    pub user_id: String,
    pub nickname: String,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterResponse {
    pub user: UserInfo,
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateGroupRequest {
    pub user_id: String,
    pub group_name: String,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JoinGroupRequest {
    pub user_id: String,
    pub group_code: String,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LeaveGroupRequest {
    pub user_id: String,
    pub group_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GroupInfo {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GroupResponse {
    pub group: GroupInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GroupSummary {
    pub code: String,
    pub name: String,
    pub member_count: i64,
    pub is_creator: bool,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MyGroupsResponse {
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OkResponse {
    pub success: bool,
}

// ─── Leaderboard ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub nickname: String,
    pub learning_time: i64,
    pub distraction_time: i64,
    pub focus_score: f64,
    pub rank: u32,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LeaderboardResponse {
    pub group_name: String,
    pub leaderboard: Vec<LeaderboardEntry>,
}

// ─── Stats sync ──────────────────────────────────────────────────────────────

/// Cumulative today-totals in seconds. Always a running total, never a
/// delta: the server merges monotonically and a delta would under-report.
#[derive(Debug, Deserialize, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncRequest {
    pub user_id: String,
    #[serde(default)]
    pub learning_time: f64,
    #[serde(default)]
    pub distraction_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatsInfo {
    pub learning_time: i64,
    pub distraction_time: i64,
    /// Milliseconds since the Unix epoch.
    pub last_updated: i64,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncResponse {
    pub stats: StatsInfo,
}

// ─── AI coach ────────────────────────────────────────────────────────────────

/// `type` is validated by the handler, not the deserializer, so an unknown
/// value yields a 400 with a specific error body.
#[derive(Debug, Deserialize, Serialize, TS)]
#[ts(export)]
pub struct AiRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    #[ts(type = "any")]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AiResponse {
    pub message: String,
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub users: i64,
    pub groups: i64,
    /// RFC 3339 timestamp of the server clock.
    pub time: String,
}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ApiError {
    pub error: String,
}

// ─── TypeScript generation ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    /// Run with: cargo test -p focuslog-api-types -- export_typescript --nocapture
    #[test]
    fn export_typescript() {
        let out_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../extension/src/lib/api-types.generated.ts");

        let cfg = ts_rs::Config::new().with_large_int("number");
        let mut parts: Vec<String> = Vec::new();
        parts.push("// AUTO-GENERATED by focuslog-api-types — DO NOT EDIT".to_string());
        parts.push(
            "// Regenerate with: cargo test -p focuslog-api-types -- export_typescript"
                .to_string(),
        );
        parts.push(String::new());

        // Collect all type declarations, converting `type X = {...}` to `export interface X {...}`
        macro_rules! collect_ts {
            ($($t:ty),+ $(,)?) => {
                $(
                    let decl = <$t>::decl(&cfg);
                    let decl = decl
                        .replacen("type ", "export interface ", 1)
                        .replace(" = {", " {")
                        .trim_end_matches(';')
                        .to_string();
                    parts.push(decl);
                    parts.push(String::new());
                )+
            };
        }

        collect_ts!(
            // Users
            RegisterRequest,
            UserInfo,
            RegisterResponse,
            // Groups
            CreateGroupRequest,
            JoinGroupRequest,
            LeaveGroupRequest,
            GroupInfo,
            GroupResponse,
            GroupSummary,
            MyGroupsResponse,
            OkResponse,
            // Leaderboard
            LeaderboardEntry,
            LeaderboardResponse,
            // Stats
            SyncRequest,
            StatsInfo,
            SyncResponse,
            // AI
            AiRequest,
            AiResponse,
            // Health
            HealthResponse,
            ApiError,
        );

        let content = parts.join("\n");

        if let Some(parent) = out_dir.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let mut file = std::fs::File::create(&out_dir)
            .unwrap_or_else(|e| panic!("Failed to create {}: {}", out_dir.display(), e));
        file.write_all(content.as_bytes())
            .unwrap_or_else(|e| panic!("Failed to write {}: {}", out_dir.display(), e));

        println!("Generated TypeScript types at: {}", out_dir.display());
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let entry = LeaderboardEntry {
            user_id: "u1".into(),
            nickname: "nico".into(),
            learning_time: 600,
            distraction_time: 120,
            focus_score: 540.0,
            rank: 1,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("learningTime").is_some());
        assert!(json.get("focusScore").is_some());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn sync_request_defaults_missing_times_to_zero() {
        let req: SyncRequest = serde_json::from_str(r#"{"userId":"u1"}"#).unwrap();
        assert_eq!(req.user_id, "u1");
        assert_eq!(req.learning_time, 0.0);
        assert_eq!(req.distraction_time, 0.0);
    }
}
