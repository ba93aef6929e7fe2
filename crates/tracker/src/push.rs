//! Periodic server push: cumulative today-totals, rank-history refresh,
//! and the once-per-day motivation cache.
//!
//! Totals are always running today-snapshots, never deltas — the server
//! merge is monotonic, so resending the same or a larger snapshot is safe
//! and a delta would be double-counted or lost.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use focuslog_api_client::ApiClient;
use focuslog_api_types::{AiRequest, SyncRequest, SyncResponse};
use focuslog_core::civil;
use focuslog_local_db::{LocalDb, RegisteredUser};

use crate::config::TrackerConfig;

/// Run the sync loop until shutdown.
pub async fn run_sync_loop(
    config: TrackerConfig,
    db: Arc<LocalDb>,
    api: ApiClient,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(
        config.server.sync_interval_secs.max(10),
    ));
    // Skip the immediate first tick so startup does not race registration.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = sync_once(&config, &db, &api).await {
                    warn!("Sync cycle failed: {e:#}");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("Sync loop shutting down");
                    break;
                }
            }
        }
    }
}

/// One full sync cycle: push totals, refresh rank history, refresh the
/// motivation cache. Skips silently when no identity is registered.
pub async fn sync_once(config: &TrackerConfig, db: &LocalDb, api: &ApiClient) -> Result<()> {
    let Some(user) = ensure_registered(config, db, api).await? else {
        debug!("No registered identity, skipping sync");
        return Ok(());
    };

    let today = civil::civil_date(Utc::now().timestamp_millis());
    let totals = db.day_totals(today)?;

    let req = SyncRequest {
        user_id: user.user_id.clone(),
        learning_time: totals.learning as f64,
        distraction_time: totals.distraction as f64,
    };
    let resp = retry_sync(api, &req, config.server.max_retries).await?;
    info!(
        "Synced stats: learning {}s, distraction {}s",
        resp.stats.learning_time, resp.stats.distraction_time
    );

    refresh_rank_history(db, api, &user).await;
    refresh_motivation(db, api, &user).await;
    Ok(())
}

/// Return the registered identity, registering with the configured nickname
/// on first contact.
async fn ensure_registered(
    config: &TrackerConfig,
    db: &LocalDb,
    api: &ApiClient,
) -> Result<Option<RegisteredUser>> {
    if let Some(user) = db.user()? {
        return Ok(Some(user));
    }

    let nickname = config.identity.nickname.trim();
    if nickname.is_empty() {
        return Ok(None);
    }

    let resp = api
        .register(nickname)
        .await
        .context("registering identity")?;
    let user = RegisteredUser {
        user_id: resp.user.user_id,
        nickname: resp.user.nickname,
    };
    db.set_user(&user)?;
    info!("Registered as '{}'", user.nickname);
    Ok(Some(user))
}

/// Record today's date for every group where we currently hold rank 1.
/// Client-local and count-only; failures are logged, never fatal.
async fn refresh_rank_history(db: &LocalDb, api: &ApiClient, user: &RegisteredUser) {
    let today = civil::civil_date(Utc::now().timestamp_millis());

    let groups = match api.my_groups(&user.user_id).await {
        Ok(resp) => resp.groups,
        Err(e) => {
            warn!("Could not list groups: {e:#}");
            return;
        }
    };

    for group in groups {
        match api.leaderboard(&group.code).await {
            Ok(board) => {
                let first_place = board
                    .leaderboard
                    .iter()
                    .find(|e| e.user_id == user.user_id)
                    .is_some_and(|e| e.rank == 1);
                if first_place {
                    if let Err(e) = db.record_rank_win(&group.code, today) {
                        warn!("Could not record rank win: {e:#}");
                    }
                }
            }
            Err(e) => warn!("Leaderboard fetch failed for {}: {e:#}", group.code),
        }
    }
}

/// Fetch and cache one motivational message per civil date. On upstream
/// failure nothing is cached and the next cycle retries; the popup shows
/// its static fallback in the meantime.
async fn refresh_motivation(db: &LocalDb, api: &ApiClient, user: &RegisteredUser) {
    let today = civil::civil_date(Utc::now().timestamp_millis());

    match db.motivation_for(today) {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            warn!("Motivation cache read failed: {e:#}");
            return;
        }
    }

    let learning_minutes = db
        .day_totals(today)
        .map(|t| t.learning / 60)
        .unwrap_or(0);
    let best_hour = db
        .learning_by_hour(today - chrono::Duration::days(14), today)
        .ok()
        .and_then(focuslog_core::aggregate::best_learning_hour);
    let best_hour_text = match best_hour {
        Some(hour) => format!("{hour}:00"),
        None => "unknown".to_string(),
    };
    let req = AiRequest {
        request_type: "motivation".to_string(),
        data: serde_json::json!({
            "event": "daily_login",
            "details": format!(
                "Student '{}' has {} minutes of learning time today; best study hour so far: {}",
                user.nickname, learning_minutes, best_hour_text
            ),
        }),
    };

    match api.ai(&req).await {
        Ok(resp) if !resp.message.is_empty() => {
            if let Err(e) = db.set_motivation(today, &resp.message) {
                warn!("Motivation cache write failed: {e:#}");
            }
        }
        Ok(_) => debug!("Empty motivation message, not caching"),
        Err(e) => warn!("Motivation fetch failed: {e:#}"),
    }
}

/// Push with exponential backoff. Retries on 5xx and network errors only;
/// returns immediately on success or 4xx.
async fn retry_sync(api: &ApiClient, req: &SyncRequest, max_retries: u32) -> Result<SyncResponse> {
    let max_attempts = max_retries + 1;

    for attempt in 0..max_attempts {
        match api.sync_stats_raw(req).await {
            Ok(resp) if resp.status().is_success() => {
                return resp.json().await.context("parsing sync response");
            }
            Ok(resp) if resp.status().is_server_error() => {
                let status = resp.status();
                if attempt + 1 < max_attempts {
                    let next_delay = 1u64 << attempt.min(4);
                    warn!(
                        "Sync attempt {}/{} failed (HTTP {}), retrying in {}s...",
                        attempt + 1,
                        max_attempts,
                        status,
                        next_delay
                    );
                    tokio::time::sleep(Duration::from_secs(next_delay)).await;
                } else {
                    bail!("sync failed after retries (HTTP {status})");
                }
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!("sync rejected (HTTP {status}): {body}");
            }
            Err(e) => {
                if attempt + 1 < max_attempts {
                    let next_delay = 1u64 << attempt.min(4);
                    warn!(
                        "Sync attempt {}/{} failed ({}), retrying in {}s...",
                        attempt + 1,
                        max_attempts,
                        e,
                        next_delay
                    );
                    tokio::time::sleep(Duration::from_secs(next_delay)).await;
                } else {
                    return Err(e).context("Failed to reach server after retries");
                }
            }
        }
    }

    unreachable!()
}
