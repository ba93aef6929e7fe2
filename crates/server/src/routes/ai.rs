use axum::{extract::State, Json};

use focuslog_api_types::{AiRequest, AiResponse};

use crate::coach::{self, GeminiClient};
use crate::error::ApiErr;

/// POST /api/ai — build the coaching prompt and delegate text generation.
///
/// Unknown types are a 400; an unreachable or failing upstream is a 500 and
/// the caller falls back to its static message.
pub async fn ai(
    State(coach): State<GeminiClient>,
    Json(req): Json<AiRequest>,
) -> Result<Json<AiResponse>, ApiErr> {
    if req.request_type.is_empty() || req.data.is_null() {
        return Err(ApiErr::bad_request("invalid request format"));
    }

    let prompt = coach::build_prompt(&req.request_type, &req.data)
        .ok_or_else(|| ApiErr::bad_request("invalid AI request type"))?;

    match coach.generate(&prompt).await {
        Ok(message) => Ok(Json(AiResponse { message })),
        Err(e) => {
            tracing::error!("generation upstream failed: {e:#}");
            Err(ApiErr::internal(coach::FALLBACK_MESSAGE))
        }
    }
}
