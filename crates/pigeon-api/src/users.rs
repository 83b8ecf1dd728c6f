use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::info;

use pigeon_types::api::{AddFriendRequest, Claims, FriendsResponse, MeResponse, SearchUsersResponse, StatusResponse};
use pigeon_types::events::GatewayEvent;
use pigeon_types::models::{User, UserSearchHit};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::{AppState, blocking};

const SEARCH_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_exclude_self")]
    pub exclude_self: bool,
}

fn default_exclude_self() -> bool {
    true
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |db| {
        let row = db
            .get_user_by_id(&claims.sub.to_string())?
            .ok_or(ApiError::NotFound("User"))?;
        Ok(User::try_from(row)?)
    })
    .await?;

    Ok(Json(MeResponse { user }))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = blocking(&state, move |db| {
        let rows = db.list_friends(&claims.sub.to_string())?;
        Ok(rows
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;

    Ok(Json(FriendsResponse { friends }))
}

/// Case-insensitive substring search on username. A blank query matches nothing.
pub async fn search_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let needle = query.username.trim().to_string();
    if needle.is_empty() {
        return Ok(Json(SearchUsersResponse { users: vec![] }));
    }

    let users = blocking(&state, move |db| {
        let me = claims.sub.to_string();
        let exclude = query.exclude_self.then_some(me.as_str());
        let rows = db.search_users(&needle, exclude, SEARCH_LIMIT)?;
        let friends = db.friend_ids(&me)?;

        rows.into_iter()
            .map(|row| {
                let is_friend = friends.contains(&row.id);
                Ok(UserSearchHit {
                    user: User::try_from(row)?,
                    is_friend,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;

    Ok(Json(SearchUsersResponse { users }))
}

/// Befriend another user. Symmetric, and repeating it is a no-op.
pub async fn add_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<AddFriendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.friend_id == claims.sub {
        return Err(ApiError::Validation("You cannot add yourself as a friend".into()));
    }

    let me_id = claims.sub;
    let friend_id = req.friend_id;
    let added = blocking(&state, move |db| {
        let friend = db
            .get_user_by_id(&friend_id.to_string())?
            .ok_or(ApiError::NotFound("User"))?;

        if !db.add_friendship(&me_id.to_string(), &friend.id)? {
            return Ok(None);
        }

        let me = db
            .get_user_by_id(&me_id.to_string())?
            .ok_or(ApiError::NotFound("User"))?;
        Ok(Some((User::try_from(me)?, User::try_from(friend)?)))
    })
    .await?;

    let Some((me, friend)) = added else {
        return Ok(Json(StatusResponse::new("Already friends")));
    };

    info!("{} and {} are now friends", me.username, friend.username);
    state
        .dispatcher
        .send_to_user(me.id, GatewayEvent::FriendAdded { user: friend.clone() })
        .await;
    state
        .dispatcher
        .send_to_user(friend.id, GatewayEvent::FriendAdded { user: me })
        .await;

    Ok(Json(StatusResponse::new("Friend added")))
}
