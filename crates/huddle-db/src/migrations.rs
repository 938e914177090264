use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS files (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            storage_path    TEXT NOT NULL,
            size            INTEGER NOT NULL,
            mime            TEXT NOT NULL,
            uploader_id     TEXT NOT NULL,
            uploader_name   TEXT NOT NULL,
            uploader_avatar TEXT,
            uploader_kind   TEXT NOT NULL,
            url             TEXT NOT NULL,
            sha256          TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        -- seq keeps append order independent of clock resolution
        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            channel_id      TEXT NOT NULL,
            author_id       TEXT NOT NULL,
            author_name     TEXT NOT NULL,
            author_avatar   TEXT,
            author_kind     TEXT NOT NULL,
            content         TEXT NOT NULL,
            file_id         TEXT REFERENCES files(id),
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reactions (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);

        CREATE TABLE IF NOT EXISTS replies (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id      TEXT NOT NULL REFERENCES messages(id),
            content         TEXT NOT NULL,
            author_id       TEXT NOT NULL,
            author_name     TEXT NOT NULL,
            author_avatar   TEXT,
            author_kind     TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_replies_message
            ON replies(message_id, seq);

        -- low_id/high_id: the participant ids in sorted order
        CREATE TABLE IF NOT EXISTS direct_messages (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            low_id      TEXT NOT NULL,
            high_id     TEXT NOT NULL,
            from_id     TEXT NOT NULL,
            to_id       TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_direct_messages_conversation
            ON direct_messages(low_id, high_id, seq);

        CREATE TABLE IF NOT EXISTS search_entries (
            kind        TEXT NOT NULL,
            id          TEXT NOT NULL,
            blob        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (kind, id)
        );

        CREATE INDEX IF NOT EXISTS idx_search_entries_recent
            ON search_entries(kind, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
