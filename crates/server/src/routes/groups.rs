use axum::{
    extract::{Path, State},
    Json,
};

use focuslog_api_types::{
    CreateGroupRequest, GroupInfo, GroupResponse, GroupSummary, JoinGroupRequest,
    LeaveGroupRequest, MyGroupsResponse, OkResponse,
};

use crate::error::ApiErr;
use crate::SharedStore;

/// Group codes are case-normalized uppercase on every lookup.
fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Create group
// ---------------------------------------------------------------------------

/// POST /api/group/create — create a group; the creator is the first member.
pub async fn create(
    State(store): State<SharedStore>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<GroupResponse>, ApiErr> {
    // Unknown user outranks a missing name, matching the original contract.
    store.identity(&req.user_id)?;

    let name = req.group_name.trim();
    if name.is_empty() {
        return Err(ApiErr::bad_request("group name required"));
    }

    let group = store.create_group(name, &req.user_id)?;
    Ok(Json(GroupResponse {
        group: GroupInfo {
            code: group.code,
            name: group.name,
        },
    }))
}

// ---------------------------------------------------------------------------
// Join group
// ---------------------------------------------------------------------------

/// POST /api/group/join — join an existing group by code.
pub async fn join(
    State(store): State<SharedStore>,
    Json(req): Json<JoinGroupRequest>,
) -> Result<Json<GroupResponse>, ApiErr> {
    if req.user_id.is_empty() || req.group_code.trim().is_empty() {
        return Err(ApiErr::bad_request("userId and groupCode required"));
    }

    let code = normalize_code(&req.group_code);
    let group = store.join_group(&req.user_id, &code)?;
    Ok(Json(GroupResponse {
        group: GroupInfo {
            code: group.code,
            name: group.name,
        },
    }))
}

// ---------------------------------------------------------------------------
// List my groups
// ---------------------------------------------------------------------------

/// GET /api/group/my-groups/:user_id — groups the user belongs to.
pub async fn my_groups(
    State(store): State<SharedStore>,
    Path(user_id): Path<String>,
) -> Result<Json<MyGroupsResponse>, ApiErr> {
    store.identity(&user_id)?;

    let groups = store
        .groups_of(&user_id)?
        .into_iter()
        .map(|g| GroupSummary {
            code: g.code,
            name: g.name,
            member_count: g.member_count,
            is_creator: g.is_creator,
        })
        .collect();

    Ok(Json(MyGroupsResponse { groups }))
}

// ---------------------------------------------------------------------------
// Leave group
// ---------------------------------------------------------------------------

/// POST /api/group/leave — leave a group; the group disappears with its
/// last member.
pub async fn leave(
    State(store): State<SharedStore>,
    Json(req): Json<LeaveGroupRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    if req.user_id.is_empty() || req.group_code.trim().is_empty() {
        return Err(ApiErr::bad_request("userId and groupCode required"));
    }

    store.identity(&req.user_id)?;
    let code = normalize_code(&req.group_code);
    store.leave_group(&req.user_id, &code)?;
    Ok(Json(OkResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::normalize_code;

    #[test]
    fn codes_normalize_to_uppercase() {
        assert_eq!(normalize_code(" a1b2c3 "), "A1B2C3");
        assert_eq!(normalize_code("FFFFFF"), "FFFFFF");
    }
}
