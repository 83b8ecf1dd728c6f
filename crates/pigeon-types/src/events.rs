use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Group, Message, User};

/// Events pushed to clients over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: Uuid, username: String },

    /// A message was appended to a conversation the receiver takes part in
    MessageCreate { message: Message },

    /// The receiver and `user` are now friends
    FriendAdded { user: User },

    /// The receiver was made a member of a new group
    GroupCreated { group: Group },

    /// `user` joined a group the receiver belongs to
    GroupMemberAdded { group_id: Uuid, user: User },
}
