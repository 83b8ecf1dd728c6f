use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use pigeon_db::models::{NewMessage, parse_uuid};
use pigeon_types::api::{Claims, MessageResponse, MessagesResponse, SendMessageRequest};
use pigeon_types::events::GatewayEvent;
use pigeon_types::models::{Message, Target};

use crate::auth::non_blank;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{AppState, blocking};

const MAX_CONTENT_CHARS: usize = 4000;
const MAX_MEDIA_URL_CHARS: usize = 2048;
const MAX_CAPTION_CHARS: usize = 1000;
const MAX_PAGE: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Only return messages with a `seq` greater than this, for incremental sync.
    pub after: Option<i64>,
    /// Without a limit the full history is returned.
    pub limit: Option<u32>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = match (req.recipient_id, req.group_id) {
        (Some(user_id), None) => Target::User(user_id),
        (None, Some(group_id)) => Target::Group(group_id),
        _ => {
            return Err(ApiError::Validation(
                "Exactly one of recipient_id or group_id is required".into(),
            ));
        }
    };

    let media_url = non_blank(req.media_url);
    let caption = non_blank(req.caption);
    if req.content.trim().is_empty() && media_url.is_none() {
        return Err(ApiError::EmptyContent);
    }
    if req.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::Validation("Message content must be at most 4000 characters".into()));
    }
    if media_url.as_ref().is_some_and(|url| url.chars().count() > MAX_MEDIA_URL_CHARS) {
        return Err(ApiError::Validation("media_url must be at most 2048 characters".into()));
    }
    if caption.as_ref().is_some_and(|c| c.chars().count() > MAX_CAPTION_CHARS) {
        return Err(ApiError::Validation("Caption must be at most 1000 characters".into()));
    }

    let sender_id = claims.sub;
    let content = req.content;
    let (message, participants) = blocking(&state, move |db| {
        let sender = sender_id.to_string();
        let participants = match target {
            Target::User(recipient_id) => {
                if db.get_user_by_id(&recipient_id.to_string())?.is_none() {
                    return Err(ApiError::NotFound("Recipient"));
                }
                if recipient_id == sender_id {
                    vec![sender_id]
                } else {
                    vec![sender_id, recipient_id]
                }
            }
            Target::Group(group_id) => {
                let gid = group_id.to_string();
                // Non-members get the same answer as for a missing group
                if db.get_group(&gid)?.is_none() || !db.is_group_member(&gid, &sender)? {
                    return Err(ApiError::NotFound("Group"));
                }
                db.group_member_ids(&gid)?
                    .iter()
                    .map(|id| parse_uuid(id, "group member id"))
                    .collect::<anyhow::Result<Vec<_>>>()?
            }
        };

        let id = Uuid::new_v4().to_string();
        let row = db.insert_message(&NewMessage {
            id: &id,
            sender_id: &sender,
            target,
            content: &content,
            media_url: media_url.as_deref(),
            caption: caption.as_deref(),
        })?;
        Ok((Message::try_from(row)?, participants))
    })
    .await?;

    state
        .dispatcher
        .send_to_users(
            participants,
            GatewayEvent::MessageCreate {
                message: message.clone(),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

/// History of one conversation, ascending by `seq`. `conversation_id` is a
/// group id, or else the id of the other user in a private conversation.
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(conversation_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.map(|l| l.min(MAX_PAGE));
    let after = query.after;

    let messages = blocking(&state, move |db| {
        let viewer = claims.sub.to_string();
        let id = conversation_id.to_string();

        let rows = if db.get_group(&id)?.is_some() {
            if !db.is_group_member(&id, &viewer)? {
                return Err(ApiError::Unauthorized("conversation"));
            }
            db.group_conversation(&id, after, limit)?
        } else if db.get_user_by_id(&id)?.is_some() {
            db.private_conversation(&viewer, &id, after, limit)?
        } else {
            return Err(ApiError::NotFound("Conversation"));
        };

        Ok(rows
            .into_iter()
            .map(Message::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;

    Ok(Json(MessagesResponse { messages }))
}
