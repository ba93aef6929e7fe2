//! Distraction alert policy.
//!
//! Evaluated on a fixed cadence over today's totals. Raises when today's
//! distraction time exceeds learning time and is itself significant, rate
//! limited to one alert per cooldown window via the persisted last-alert
//! timestamp.

use crate::aggregate::CategoryTotals;

/// Distraction below this many seconds never alerts.
pub const MIN_DISTRACTION_SECS: i64 = 60;

/// Minimum gap between two alerts.
pub const ALERT_COOLDOWN_MS: i64 = 30 * 60 * 1000;

/// Decide whether to raise a distraction alert now.
///
/// Returns the user-facing message, or `None` when the thresholds or the
/// cooldown say no.
pub fn evaluate(today: &CategoryTotals, last_alert_ms: i64, now_ms: i64) -> Option<String> {
    if today.distraction <= today.learning || today.distraction <= MIN_DISTRACTION_SECS {
        return None;
    }
    if now_ms - last_alert_ms <= ALERT_COOLDOWN_MS {
        return None;
    }

    let distraction_min = today.distraction / 60;
    let learning_min = today.learning / 60;
    Some(format!(
        "Distraction ({distraction_min}m) > Learning ({learning_min}m). Time to refocus!"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(learning: i64, distraction: i64) -> CategoryTotals {
        CategoryTotals {
            learning,
            distraction,
            mixed: 0,
        }
    }

    #[test]
    fn alerts_when_distraction_dominates() {
        let msg = evaluate(&totals(120, 600), 0, ALERT_COOLDOWN_MS + 1).unwrap();
        assert_eq!(msg, "Distraction (10m) > Learning (2m). Time to refocus!");
    }

    #[test]
    fn no_alert_when_learning_leads() {
        assert!(evaluate(&totals(600, 120), 0, ALERT_COOLDOWN_MS + 1).is_none());
    }

    #[test]
    fn no_alert_for_insignificant_distraction() {
        assert!(evaluate(&totals(0, 60), 0, ALERT_COOLDOWN_MS + 1).is_none());
    }

    #[test]
    fn cooldown_suppresses_repeat_alerts() {
        let now = 1_000_000;
        assert!(evaluate(&totals(0, 600), now - 1000, now).is_none());
        assert!(evaluate(&totals(0, 600), now - ALERT_COOLDOWN_MS - 1, now).is_some());
    }
}
