use axum::{extract::State, Json};

use focuslog_api_types::{RegisterRequest, RegisterResponse, UserInfo};

use crate::error::ApiErr;
use crate::SharedStore;

const MAX_NICKNAME_LEN: usize = 32;

/// POST /api/user/register — claim a nickname, receive an identity token.
pub async fn register(
    State(store): State<SharedStore>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiErr> {
    let nickname = req.nickname.trim();
    if nickname.is_empty() {
        return Err(ApiErr::bad_request("nickname required"));
    }
    if nickname.len() > MAX_NICKNAME_LEN {
        return Err(ApiErr::bad_request(format!(
            "nickname must be at most {MAX_NICKNAME_LEN} characters"
        )));
    }

    let identity = store.create_identity(nickname)?;
    Ok(Json(RegisterResponse {
        user: UserInfo {
            user_id: identity.user_id,
            nickname: identity.nickname,
        },
    }))
}
