use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile. The password hash never leaves the db crate.
///
/// Field names follow what the mobile client already reads (`_id`,
/// `user_first_name`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "user_first_name")]
    pub first_name: Option<String>,
    #[serde(rename = "user_last_name")]
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A search result, annotated with whether the searcher is already friends with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSearchHit {
    #[serde(flatten)]
    pub user: User,
    pub is_friend: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
    pub members: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A group with its member profiles resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDetail {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
    pub members: Vec<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Private,
    Group,
}

/// Where a message is addressed. A message targets a user or a group, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    User(Uuid),
    Group(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Server-assigned position in the global message order.
    pub seq: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub recipient_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub content: String,
    /// Link to an attachment hosted elsewhere; the server stores it as given.
    pub media_url: Option<String>,
    pub caption: Option<String>,
    pub timestamp: DateTime<Utc>,
}
