//! The single consumer of the tracker event stream.
//!
//! One `select!` loop owns the reducer and the local DB handle, so at most
//! one aggregator mutation is ever in flight: a navigation arriving while a
//! write runs simply queues behind it on the channel. Tracking errors are
//! logged and swallowed — a failed write means the observation is retried
//! at the next boundary, never a crashed loop.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use focuslog_core::alert;
use focuslog_core::civil;
use focuslog_core::tracker::{IdleState, Tracker, TrackerEvent};
use focuslog_local_db::LocalDb;

use crate::config::TrackerConfig;
use crate::notifier::Notifier;

const ALERT_TITLE: &str = "Focus Alert";

pub async fn run_engine(
    config: TrackerConfig,
    db: Arc<LocalDb>,
    mut rx: mpsc::UnboundedReceiver<TrackerEvent>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
    notifier: Arc<dyn Notifier>,
) {
    let mut tracker = Tracker::new();

    let mut sample = tokio::time::interval(Duration::from_secs(
        config.tracker.sample_interval_secs.max(1),
    ));
    let mut alert_tick = tokio::time::interval(Duration::from_secs(
        config.tracker.alert_interval_secs.max(1),
    ));

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                handle_event(&mut tracker, &db, event, Utc::now().timestamp_millis());
            }

            _ = sample.tick() => {
                handle_event(&mut tracker, &db, TrackerEvent::TimerFired, Utc::now().timestamp_millis());
            }

            _ = alert_tick.tick() => {
                check_alert(&db, notifier.as_ref(), Utc::now().timestamp_millis());
            }

            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    // Flush the open observation before stopping.
                    handle_event(
                        &mut tracker,
                        &db,
                        TrackerEvent::IdleChanged(IdleState::Idle),
                        Utc::now().timestamp_millis(),
                    );
                    info!("Engine shutting down");
                    break;
                }
            }
        }
    }
}

/// Apply one event to the reducer and persist any closed session.
fn handle_event(tracker: &mut Tracker, db: &LocalDb, event: TrackerEvent, now_ms: i64) {
    let Some(session) = tracker.apply(event, now_ms) else {
        return;
    };

    debug!(
        "Closed session: {} [{}] {}s",
        session.hostname, session.category, session.duration_seconds
    );
    if let Err(e) = db.record_session(&session, civil::civil_date(now_ms)) {
        error!("Failed to record session: {e:#}");
    }
}

/// Evaluate the distraction-alert policy over today's totals.
fn check_alert(db: &LocalDb, notifier: &dyn Notifier, now_ms: i64) {
    let result: Result<()> = (|| {
        let today = civil::civil_date(now_ms);
        let totals = db.day_totals(today)?;
        let last_alert = db.last_alert_ms()?;

        if let Some(message) = alert::evaluate(&totals, last_alert, now_ms) {
            notifier.notify(ALERT_TITLE, &message)?;
            db.set_last_alert_ms(now_ms)?;
        }
        Ok(())
    })();

    if let Err(e) = result {
        error!("Alert check failed: {e:#}");
    }
}
