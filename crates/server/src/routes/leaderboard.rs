use axum::{
    extract::{Path, State},
    Json,
};

use focuslog_api_types::{LeaderboardEntry, LeaderboardResponse};
use focuslog_core::score::focus_score;

use crate::error::ApiErr;
use crate::store::{Member, MergedStats};
use crate::SharedStore;

/// GET /api/leaderboard/:group_code — members ranked by focus score.
pub async fn leaderboard(
    State(store): State<SharedStore>,
    Path(group_code): Path<String>,
) -> Result<Json<LeaderboardResponse>, ApiErr> {
    let code = group_code.trim().to_uppercase();
    let group = store.group(&code)?;

    let mut rows = Vec::new();
    for member in store.members(&code)? {
        let stats = store.stats(&member.user_id)?;
        rows.push((member, stats));
    }

    Ok(Json(LeaderboardResponse {
        group_name: group.name,
        leaderboard: rank_members(rows),
    }))
}

/// Sort descending by focus score and assign dense 1-based ranks. The sort
/// is stable, so ties keep the incoming (joined-at) order.
fn rank_members(rows: Vec<(Member, MergedStats)>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .map(|(member, stats)| LeaderboardEntry {
            user_id: member.user_id,
            nickname: member.nickname,
            learning_time: stats.learning_time,
            distraction_time: stats.distraction_time,
            focus_score: focus_score(stats.learning_time, stats.distraction_time),
            rank: 0,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.focus_score
            .partial_cmp(&a.focus_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = (i + 1) as u32;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> Member {
        Member {
            user_id: id.to_string(),
            nickname: id.to_string(),
        }
    }

    fn stats(learning: i64, distraction: i64) -> MergedStats {
        MergedStats {
            learning_time: learning,
            distraction_time: distraction,
            last_updated_ms: 0,
        }
    }

    #[test]
    fn ranks_are_a_dense_permutation_ordered_by_score() {
        let rows = vec![
            (member("a"), stats(100, 0)),   // 100
            (member("b"), stats(600, 200)), // 500
            (member("c"), stats(0, 999)),   // 0
            (member("d"), stats(300, 100)), // 250
        ];
        let entries = rank_members(rows);

        let ids: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);

        let ranks: Vec<u32> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);

        for pair in entries.windows(2) {
            assert!(pair[0].focus_score >= pair[1].focus_score);
        }
    }

    #[test]
    fn ties_keep_input_order() {
        let rows = vec![
            (member("first"), stats(100, 0)),
            (member("second"), stats(100, 0)),
        ];
        let entries = rank_members(rows);
        assert_eq!(entries[0].user_id, "first");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].user_id, "second");
        assert_eq!(entries[1].rank, 2);
    }

    #[test]
    fn score_floors_at_zero_in_entries() {
        let entries = rank_members(vec![(member("a"), stats(10, 600))]);
        assert_eq!(entries[0].focus_score, 0.0);
    }
}
