use axum::{extract::State, Json};
use chrono::Utc;

use focuslog_api_types::{StatsInfo, SyncRequest, SyncResponse};

use crate::error::ApiErr;
use crate::SharedStore;

/// POST /api/stats/sync — merge a cumulative today-snapshot monotonically.
///
/// Inputs are running totals, never deltas. Values are floored to whole
/// seconds; the store only ever raises them, so repeated or out-of-order
/// delivery of the same or any larger snapshot is harmless.
pub async fn sync(
    State(store): State<SharedStore>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiErr> {
    if req.user_id.is_empty() {
        return Err(ApiErr::bad_request("userId required"));
    }

    let learning = floor_seconds(req.learning_time);
    let distraction = floor_seconds(req.distraction_time);
    let now_ms = Utc::now().timestamp_millis();

    let merged = store.merge_stats(&req.user_id, learning, distraction, now_ms)?;

    Ok(Json(SyncResponse {
        stats: StatsInfo {
            learning_time: merged.learning_time,
            distraction_time: merged.distraction_time,
            last_updated: merged.last_updated_ms,
        },
    }))
}

/// Floor to whole seconds; NaN and negatives clamp to zero.
fn floor_seconds(value: f64) -> i64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::floor_seconds;

    #[test]
    fn floors_fractional_seconds() {
        assert_eq!(floor_seconds(12.9), 12);
        assert_eq!(floor_seconds(0.4), 0);
    }

    #[test]
    fn rejects_nan_and_negative() {
        assert_eq!(floor_seconds(f64::NAN), 0);
        assert_eq!(floor_seconds(-5.0), 0);
    }
}
