//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the pigeon-types models so the storage layer stays independent.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use pigeon_types::models::{Group, GroupDetail, Message, MessageKind, Target, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to insert a user; timestamps are assigned by the store.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub password_hash: &'a str,
}

pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub seq: i64,
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub recipient_id: Option<String>,
    pub group_id: Option<String>,
    pub content: String,
    pub media_url: Option<String>,
    pub caption: Option<String>,
    /// Microseconds since the Unix epoch.
    pub created_at: i64,
}

/// A message to append; `seq` and `created_at` are assigned by the store.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub sender_id: &'a str,
    pub target: Target,
    pub content: &'a str,
    pub media_url: Option<&'a str>,
    pub caption: Option<&'a str>,
}

pub fn parse_uuid(raw: &str, column: &str) -> Result<Uuid> {
    raw.parse()
        .with_context(|| format!("corrupt {} '{}'", column, raw))
}

pub(crate) fn parse_time(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("corrupt {} '{}'", column, raw))
}

pub(crate) fn now_rfc3339() -> String {
    // Fixed precision keeps the stored strings lexically sortable.
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id, "user id")?,
            created_at: parse_time(&row.created_at, "users.created_at")?,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
        })
    }
}

impl GroupRow {
    /// Attach member ids to build the API model.
    pub fn into_group(self, member_ids: &[String]) -> Result<Group> {
        let members = member_ids
            .iter()
            .map(|id| parse_uuid(id, "group member id"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Group {
            id: parse_uuid(&self.id, "group id")?,
            creator_id: parse_uuid(&self.creator_id, "group creator_id")?,
            created_at: parse_time(&self.created_at, "chat_groups.created_at")?,
            updated_at: parse_time(&self.updated_at, "chat_groups.updated_at")?,
            name: self.name,
            members,
        })
    }

    /// Attach resolved member profiles.
    pub fn into_detail(self, members: Vec<User>) -> Result<GroupDetail> {
        Ok(GroupDetail {
            id: parse_uuid(&self.id, "group id")?,
            creator_id: parse_uuid(&self.creator_id, "group creator_id")?,
            created_at: parse_time(&self.created_at, "chat_groups.created_at")?,
            updated_at: parse_time(&self.updated_at, "chat_groups.updated_at")?,
            name: self.name,
            members,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let recipient_id = row
            .recipient_id
            .as_deref()
            .map(|id| parse_uuid(id, "message recipient_id"))
            .transpose()?;
        let group_id = row
            .group_id
            .as_deref()
            .map(|id| parse_uuid(id, "message group_id"))
            .transpose()?;

        let kind = match (&recipient_id, &group_id) {
            (Some(_), None) => MessageKind::Private,
            (None, Some(_)) => MessageKind::Group,
            _ => return Err(anyhow!("message {} has no single target", row.id)),
        };

        Ok(Message {
            id: parse_uuid(&row.id, "message id")?,
            seq: row.seq,
            kind,
            sender_id: parse_uuid(&row.sender_id, "message sender_id")?,
            sender_name: row.sender_name,
            recipient_id,
            group_id,
            content: row.content,
            media_url: row.media_url,
            caption: row.caption,
            timestamp: DateTime::from_timestamp_micros(row.created_at)
                .ok_or_else(|| anyhow!("corrupt created_at {} on message {}", row.created_at, row.id))?,
        })
    }
}
