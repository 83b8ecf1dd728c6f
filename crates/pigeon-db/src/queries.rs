use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use pigeon_types::models::Target;

use crate::Database;
use crate::models::{GroupRow, MessageRow, NewMessage, NewUser, UserRow, now_rfc3339};

const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.first_name, u.last_name, u.password, u.created_at, u.updated_at";

const GROUP_COLUMNS: &str = "g.id, g.name, g.creator_id, g.created_at, g.updated_at";

// JOIN users to fetch sender_name in the same query
const MESSAGE_SELECT: &str = "SELECT m.seq, m.id, m.sender_id, COALESCE(u.username, 'unknown'),
            m.recipient_id, m.group_id, m.content, m.media_url, m.caption, m.created_at
     FROM messages m
     LEFT JOIN users u ON u.id = m.sender_id";

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` if the username or email is already taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            let result = conn.execute(
                "INSERT INTO users (id, username, email, first_name, last_name, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.first_name,
                    user.last_name,
                    user.password_hash,
                    now
                ],
            );

            match result {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Look a user up by username or email, case-insensitively.
    pub fn get_user_by_identifier(&self, identifier: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1 OR u.email = ?1 LIMIT 1"
            );
            let row = conn.query_row(&sql, [identifier], user_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let taken = conn
                .query_row(
                    "SELECT 1 FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
                    [username, email],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            Ok(taken)
        })
    }

    /// Case-insensitive substring search on username, ordered by username.
    pub fn search_users(&self, query: &str, exclude_id: Option<&str>, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let pattern = format!("%{}%", escape_like(query));
            let sql = format!(
                r"SELECT {USER_COLUMNS} FROM users u
                 WHERE u.username LIKE ?1 ESCAPE '\'
                   AND (?2 IS NULL OR u.id <> ?2)
                 ORDER BY u.username COLLATE NOCASE
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![pattern, exclude_id, limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns the ids from `ids` that do not belong to any user.
    pub fn find_missing_users(&self, ids: &[String]) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM users WHERE id = ?1")?;
            let mut missing = Vec::new();
            for id in ids {
                if stmt.query_row([id], |_| Ok(())).optional()?.is_none() {
                    missing.push(id.clone());
                }
            }
            Ok(missing)
        })
    }

    // -- Friends --

    /// Make `user_id` and `friend_id` friends in both directions.
    /// Returns `false` if they already were.
    pub fn add_friendship(&self, user_id: &str, friend_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, ?3)",
                )?;
                inserted += stmt.execute(params![user_id, friend_id, now])?;
                inserted += stmt.execute(params![friend_id, user_id, now])?;
            }
            tx.commit()?;
            Ok(inserted > 0)
        })
    }

    pub fn list_friends(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM friendships f
                 JOIN users u ON u.id = f.friend_id
                 WHERE f.user_id = ?1
                 ORDER BY u.username COLLATE NOCASE"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn friend_ids(&self, user_id: &str) -> Result<HashSet<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT friend_id FROM friendships WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<String>, _>>()?;
            Ok(ids)
        })
    }

    // -- Groups --

    /// Create a group and its membership in one transaction. `creator_id` is
    /// always a member; duplicates in `member_ids` are ignored.
    pub fn create_group(
        &self,
        id: &str,
        name: &str,
        creator_id: &str,
        member_ids: &[String],
    ) -> Result<(GroupRow, Vec<String>)> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chat_groups (id, name, creator_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, name, creator_id, now],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO group_members (group_id, user_id, added_at) VALUES (?1, ?2, ?3)",
                )?;
                stmt.execute(params![id, creator_id, now])?;
                for member in member_ids {
                    stmt.execute(params![id, member, now])?;
                }
            }

            let group = query_group(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("group {} vanished inside its own transaction", id))?;
            let members = query_group_member_ids(&tx, id)?;
            tx.commit()?;
            Ok((group, members))
        })
    }

    pub fn get_group(&self, id: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| query_group(conn, id))
    }

    pub fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| query_group_member_ids(conn, group_id))
    }

    pub fn group_members(&self, group_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM group_members gm
                 JOIN users u ON u.id = gm.user_id
                 WHERE gm.group_id = ?1
                 ORDER BY gm.added_at, u.username COLLATE NOCASE"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([group_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_group_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                    [group_id, user_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            Ok(found)
        })
    }

    /// Add a member. Returns `false` if they already belonged to the group.
    pub fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_id, added_at) VALUES (?1, ?2, ?3)",
                params![group_id, user_id, now],
            )?;
            if inserted > 0 {
                tx.execute(
                    "UPDATE chat_groups SET updated_at = ?2 WHERE id = ?1",
                    params![group_id, now],
                )?;
            }
            tx.commit()?;
            Ok(inserted > 0)
        })
    }

    /// Groups `user_id` belongs to, newest first, each with its member ids.
    pub fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<(GroupRow, Vec<String>)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {GROUP_COLUMNS} FROM chat_groups g
                 JOIN group_members gm ON gm.group_id = g.id
                 WHERE gm.user_id = ?1
                 ORDER BY g.created_at DESC, g.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let groups = stmt
                .query_map([user_id], group_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            groups
                .into_iter()
                .map(|group| {
                    let members = query_group_member_ids(conn, &group.id)?;
                    Ok::<_, anyhow::Error>((group, members))
                })
                .collect()
        })
    }

    // -- Messages --

    /// Append a message. `seq` and `created_at` are assigned under the write
    /// lock, so both strictly increase across every message ever stored.
    pub fn insert_message(&self, message: &NewMessage<'_>) -> Result<MessageRow> {
        let (recipient_id, group_id) = match message.target {
            Target::User(user_id) => (Some(user_id.to_string()), None),
            Target::Group(group_id) => (None, Some(group_id.to_string())),
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let last: Option<i64> = tx
                .query_row(
                    "SELECT created_at FROM messages ORDER BY seq DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            let now = Utc::now().timestamp_micros();
            let created_at = match last {
                Some(last) if last >= now => last + 1,
                _ => now,
            };

            tx.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, group_id, content, media_url, caption, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    message.id,
                    message.sender_id,
                    recipient_id,
                    group_id,
                    message.content,
                    message.media_url,
                    message.caption,
                    created_at
                ],
            )?;
            let seq = tx.last_insert_rowid();

            let sql = format!("{MESSAGE_SELECT} WHERE m.seq = ?1");
            let row = tx.query_row(&sql, [seq], message_from_row)?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Messages exchanged between `a` and `b` in either direction, ascending by seq.
    pub fn private_conversation(
        &self,
        a: &str,
        b: &str,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE m.recipient_id IS NOT NULL
                   AND ((m.sender_id = ?1 AND m.recipient_id = ?2)
                     OR (m.sender_id = ?2 AND m.recipient_id = ?1))
                   AND m.seq > ?3
                 ORDER BY m.seq ASC
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![a, b, after.unwrap_or(0), sql_limit(limit)], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn group_conversation(&self, group_id: &str, after: Option<i64>, limit: Option<u32>) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE m.group_id = ?1 AND m.seq > ?2
                 ORDER BY m.seq ASC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![group_id, after.unwrap_or(0), sql_limit(limit)], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<u32>) -> i64 {
    limit.map_or(-1, i64::from)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        password: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        creator_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        seq: row.get(0)?,
        id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get(3)?,
        recipient_id: row.get(4)?,
        group_id: row.get(5)?,
        content: row.get(6)?,
        media_url: row.get(7)?,
        caption: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    let row = conn.query_row(&sql, [id], user_from_row).optional()?;
    Ok(row)
}

fn query_group(conn: &Connection, id: &str) -> Result<Option<GroupRow>> {
    let sql = format!("SELECT {GROUP_COLUMNS} FROM chat_groups g WHERE g.id = ?1");
    let row = conn.query_row(&sql, [id], group_from_row).optional()?;
    Ok(row)
}

fn query_group_member_ids(conn: &Connection, group_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY added_at, user_id")?;
    let ids = stmt
        .query_map([group_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}
