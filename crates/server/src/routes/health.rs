use axum::{extract::State, Json};
use chrono::Utc;

use focuslog_api_types::HealthResponse;

use crate::error::ApiErr;
use crate::SharedStore;

/// GET /api/health — liveness plus store counts.
pub async fn health(State(store): State<SharedStore>) -> Result<Json<HealthResponse>, ApiErr> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        users: store.user_count()?,
        groups: store.group_count()?,
        time: Utc::now().to_rfc3339(),
    }))
}
