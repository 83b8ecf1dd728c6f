use std::collections::HashSet;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use pigeon_db::models::{GroupRow, parse_uuid};
use pigeon_types::api::{
    AddMemberRequest, Claims, CreateGroupRequest, GroupDetailResponse, GroupResponse, GroupsResponse,
    StatusResponse,
};
use pigeon_types::events::GatewayEvent;
use pigeon_types::models::User;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::{AppState, blocking};

const MAX_GROUP_NAME_LEN: usize = 100;

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let groups = blocking(&state, move |db| {
        let rows = db.list_groups_for_user(&claims.sub.to_string())?;
        Ok(rows
            .into_iter()
            .map(|(group, members)| group.into_group(&members))
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;

    Ok(Json(GroupsResponse { groups }))
}

/// Create a group named `name`. The creator is always made a member.
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::InvalidName);
    }
    if name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(ApiError::Validation("Group name must be at most 100 characters".into()));
    }
    if req.members.is_empty() {
        return Err(ApiError::EmptyMembership);
    }

    let mut seen = HashSet::new();
    let member_ids: Vec<String> = req
        .members
        .into_iter()
        .filter(|id| seen.insert(*id))
        .map(|id| id.to_string())
        .collect();

    let creator_id = claims.sub.to_string();
    let group_id = Uuid::new_v4().to_string();
    let group = blocking(&state, move |db| {
        if !db.find_missing_users(&member_ids)?.is_empty() {
            return Err(ApiError::NotFound("User"));
        }
        let (row, members) = db.create_group(&group_id, &name, &creator_id, &member_ids)?;
        Ok(row.into_group(&members)?)
    })
    .await?;

    info!(
        "{} created group '{}' ({}) with {} members",
        claims.username,
        group.name,
        group.id,
        group.members.len()
    );
    state
        .dispatcher
        .send_to_users(
            group.members.clone(),
            GatewayEvent::GroupCreated { group: group.clone() },
        )
        .await;

    Ok((StatusCode::CREATED, Json(GroupResponse { group })))
}

pub async fn get_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(group_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let group = blocking(&state, move |db| {
        let row = member_group(db, group_id, claims.sub)?;
        let members = db
            .group_members(&row.id)?
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(row.into_detail(members)?)
    })
    .await?;

    Ok(Json(GroupDetailResponse { group }))
}

/// Add `user_id` to the group. Only existing members may add people.
pub async fn add_member(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    let added = blocking(&state, move |db| {
        let group = member_group(db, group_id, caller)?;
        let user = db
            .get_user_by_id(&req.user_id.to_string())?
            .ok_or(ApiError::NotFound("User"))?;

        if !db.add_group_member(&group.id, &user.id)? {
            return Ok(None);
        }

        let members = db
            .group_member_ids(&group.id)?
            .iter()
            .map(|id| parse_uuid(id, "group member id"))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Some((User::try_from(user)?, members)))
    })
    .await?;

    let Some((user, members)) = added else {
        return Ok(Json(StatusResponse::new("Already a member")));
    };

    info!("{} added {} to group {}", claims.username, user.username, group_id);
    state
        .dispatcher
        .send_to_users(members, GatewayEvent::GroupMemberAdded { group_id, user })
        .await;

    Ok(Json(StatusResponse::new("Member added")))
}

/// Load a group the caller belongs to: `NotFound` if it doesn't exist,
/// `Unauthorized` if they aren't a member.
fn member_group(db: &pigeon_db::Database, group_id: Uuid, user_id: Uuid) -> Result<GroupRow, ApiError> {
    let group = db
        .get_group(&group_id.to_string())?
        .ok_or(ApiError::NotFound("Group"))?;
    if !db.is_group_member(&group.id, &user_id.to_string())? {
        return Err(ApiError::Unauthorized("group"));
    }
    Ok(group)
}
