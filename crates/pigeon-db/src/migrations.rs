use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                first_name  TEXT,
                last_name   TEXT,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            -- Stored in both directions; one row per (user, friend) pair.
            CREATE TABLE friendships (
                user_id     TEXT NOT NULL REFERENCES users(id),
                friend_id   TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, friend_id)
            );

            CREATE TABLE chat_groups (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                creator_id  TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE group_members (
                group_id    TEXT NOT NULL REFERENCES chat_groups(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                added_at    TEXT NOT NULL,
                PRIMARY KEY (group_id, user_id)
            );

            CREATE INDEX idx_group_members_user ON group_members(user_id);

            CREATE TABLE messages (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL UNIQUE,
                sender_id       TEXT NOT NULL REFERENCES users(id),
                recipient_id    TEXT REFERENCES users(id),
                group_id        TEXT REFERENCES chat_groups(id),
                content         TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                CHECK ((recipient_id IS NULL) <> (group_id IS NULL))
            );

            CREATE INDEX idx_messages_private
                ON messages(sender_id, recipient_id, seq) WHERE recipient_id IS NOT NULL;
            CREATE INDEX idx_messages_group
                ON messages(group_id, seq) WHERE group_id IS NOT NULL;

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (message attachments)");
        conn.execute_batch(
            "
            BEGIN;
            ALTER TABLE messages ADD COLUMN media_url TEXT;
            ALTER TABLE messages ADD COLUMN caption TEXT;
            INSERT INTO schema_version (version) VALUES (2);
            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
