use std::collections::HashMap;

use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use huddle_types::models::{
    ConversationKey, DirectMessage, FileRecord, Message, MessageId, Reactions, Reply, SearchKind,
    Thread,
};
use huddle_types::store::{SearchEntry, SearchMatch};

use crate::Database;
use crate::models::{
    DirectMessageRow, FileRow, IdentityRow, MessageRow, ReactionRow, ReplyRow, format_timestamp,
    parse_id, parse_timestamp,
};

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.channel_id, m.author_id, m.author_name, m.author_avatar, m.author_kind,
           m.content, m.created_at,
           f.id, f.name, f.storage_path, f.size, f.mime, f.uploader_id, f.uploader_name,
           f.uploader_avatar, f.uploader_kind, f.url, f.sha256, f.created_at
    FROM messages m
    LEFT JOIN files f ON m.file_id = f.id";

const FILE_SELECT: &str = "
    SELECT id, name, storage_path, size, mime, uploader_id, uploader_name, uploader_avatar,
           uploader_kind, url, sha256, created_at
    FROM files";

impl Database {
    // -- Messages --

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let author = IdentityRow::from_identity(&message.author);
        let file_id = message.file.as_ref().map(|f| f.id.to_string());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, channel_id, author_id, author_name, author_avatar, author_kind,
                     content, file_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    message.id.to_string(),
                    message.channel_id,
                    author.id,
                    author.name,
                    author.avatar,
                    author.kind,
                    message.content,
                    file_id,
                    format_timestamp(message.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            let row = conn
                .query_row(&sql, [id.to_string()], message_row)
                .optional()?;
            match row {
                Some(row) => Ok(hydrate(conn, vec![row])?.pop()),
                None => Ok(None),
            }
        })
    }

    /// The last `limit` messages, oldest first.
    pub fn recent_messages(&self, limit: usize) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} ORDER BY m.seq DESC LIMIT ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map([limit as i64], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            hydrate(conn, rows)
        })
    }

    // -- Reactions --

    /// Returns whether a row was inserted plus the message's full reaction
    /// map, or `None` if the message does not exist.
    pub fn add_reaction(
        &self,
        message_id: MessageId,
        emoji: &str,
        user_id: &str,
    ) -> Result<Option<(bool, Reactions)>> {
        let id = message_id.to_string();
        self.with_conn(|conn| {
            if !message_exists(conn, &id)? {
                return Ok(None);
            }
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO reactions (message_id, user_id, emoji) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, user_id, emoji],
            )? == 1;
            let reactions = load_reactions(conn, std::slice::from_ref(&id))?
                .remove(&id)
                .unwrap_or_default();
            Ok(Some((inserted, reactions)))
        })
    }

    /// Counterpart of [`Database::add_reaction`].
    pub fn remove_reaction(
        &self,
        message_id: MessageId,
        emoji: &str,
        user_id: &str,
    ) -> Result<Option<(bool, Reactions)>> {
        let id = message_id.to_string();
        self.with_conn(|conn| {
            if !message_exists(conn, &id)? {
                return Ok(None);
            }
            let deleted = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                rusqlite::params![id, user_id, emoji],
            )? == 1;
            let reactions = load_reactions(conn, std::slice::from_ref(&id))?
                .remove(&id)
                .unwrap_or_default();
            Ok(Some((deleted, reactions)))
        })
    }

    // -- Threads --

    /// Append a reply and return the whole thread, or `None` if the message
    /// does not exist.
    pub fn insert_reply(&self, message_id: MessageId, reply: &Reply) -> Result<Option<Thread>> {
        let id = message_id.to_string();
        let author = IdentityRow::from_identity(&reply.author);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !message_exists(&tx, &id)? {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO replies
                    (message_id, content, author_id, author_name, author_avatar, author_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    reply.content,
                    author.id,
                    author.name,
                    author.avatar,
                    author.kind,
                    format_timestamp(reply.created_at),
                ],
            )?;
            let replies = load_replies(&tx, std::slice::from_ref(&id))?
                .remove(&id)
                .unwrap_or_default();
            tx.commit()?;
            Ok(Some(Thread::from_replies(replies)))
        })
    }

    // -- Direct messages --

    pub fn insert_direct_message(&self, key: &ConversationKey, entry: &DirectMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO direct_messages (low_id, high_id, from_id, to_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    key.low(),
                    key.high(),
                    entry.from,
                    entry.to,
                    entry.content,
                    format_timestamp(entry.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_conversation(&self, key: &ConversationKey) -> Result<Vec<DirectMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT from_id, to_id, content, created_at
                 FROM direct_messages
                 WHERE low_id = ?1 AND high_id = ?2
                 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map([key.low(), key.high()], |row| {
                    Ok(DirectMessageRow {
                        from_id: row.get(0)?,
                        to_id: row.get(1)?,
                        content: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(DirectMessageRow::into_direct_message).collect()
        })
    }

    // -- Files --

    pub fn insert_file(&self, record: &FileRecord) -> Result<()> {
        let uploader = IdentityRow::from_identity(&record.uploader);
        let size = i64::try_from(record.size)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files
                    (id, name, storage_path, size, mime, uploader_id, uploader_name,
                     uploader_avatar, uploader_kind, url, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    record.id.to_string(),
                    record.name,
                    record.storage_path,
                    size,
                    record.mime,
                    uploader.id,
                    uploader.name,
                    uploader.avatar,
                    uploader.kind,
                    record.url,
                    record.sha256,
                    format_timestamp(record.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_file(&self, id: uuid::Uuid) -> Result<Option<FileRecord>> {
        self.with_conn(|conn| {
            let sql = format!("{FILE_SELECT} WHERE id = ?1");
            conn.query_row(&sql, [id.to_string()], |row| file_row(row, 0))
                .optional()?
                .map(FileRow::into_record)
                .transpose()
        })
    }

    // -- Search --

    pub fn upsert_search_entry(&self, entry: &SearchEntry) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO search_entries (kind, id, blob, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    entry.kind.as_str(),
                    entry.id.to_string(),
                    entry.blob,
                    format_timestamp(entry.timestamp),
                ],
            )?;
            Ok(())
        })
    }

    /// `term` must already be normalized (trimmed, lower-cased).
    pub fn search_entries(&self, term: &str, kind: SearchKind, limit: usize) -> Result<Vec<SearchMatch>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at FROM search_entries
                 WHERE kind = ?1 AND instr(blob, ?2) > 0
                 ORDER BY created_at DESC, id ASC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![kind.as_str(), term, limit as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, created_at)| -> Result<SearchMatch> {
                    Ok(SearchMatch {
                        id: parse_id(&id)?,
                        kind,
                        timestamp: parse_timestamp(&created_at)?,
                    })
                })
                .collect()
        })
    }
}

fn message_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM messages WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn identity_row(row: &Row<'_>, at: usize) -> rusqlite::Result<IdentityRow> {
    Ok(IdentityRow {
        id: row.get(at)?,
        name: row.get(at + 1)?,
        avatar: row.get(at + 2)?,
        kind: row.get(at + 3)?,
    })
}

fn file_row(row: &Row<'_>, at: usize) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(at)?,
        name: row.get(at + 1)?,
        storage_path: row.get(at + 2)?,
        size: row.get(at + 3)?,
        mime: row.get(at + 4)?,
        uploader: identity_row(row, at + 5)?,
        url: row.get(at + 9)?,
        sha256: row.get(at + 10)?,
        created_at: row.get(at + 11)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let file = match row.get::<_, Option<String>>(8)? {
        Some(_) => Some(file_row(row, 8)?),
        None => None,
    };
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        author: identity_row(row, 2)?,
        content: row.get(6)?,
        created_at: row.get(7)?,
        file,
    })
}

/// Attach reactions and threads, batched over all rows.
fn hydrate(conn: &Connection, rows: Vec<MessageRow>) -> Result<Vec<Message>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut reactions = load_reactions(conn, &ids)?;
    let mut replies = load_replies(conn, &ids)?;

    rows.into_iter()
        .map(|row| -> Result<Message> {
            let id = row.id.clone();
            let mut message = row.into_message()?;
            message.reactions = reactions.remove(&id).unwrap_or_default();
            message.thread = replies.remove(&id).map(Thread::from_replies);
            Ok(message)
        })
        .collect()
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn load_reactions(conn: &Connection, message_ids: &[String]) -> Result<HashMap<String, Reactions>> {
    if message_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT message_id, user_id, emoji FROM reactions WHERE message_id IN ({})",
        placeholders(message_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = message_ids.iter().map(|id| id as &dyn ToSql).collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                emoji: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_message: HashMap<String, Reactions> = HashMap::new();
    for row in rows {
        by_message
            .entry(row.message_id)
            .or_default()
            .add(&row.emoji, &row.user_id);
    }
    Ok(by_message)
}

fn load_replies(conn: &Connection, message_ids: &[String]) -> Result<HashMap<String, Vec<Reply>>> {
    if message_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT message_id, content, author_id, author_name, author_avatar, author_kind, created_at
         FROM replies WHERE message_id IN ({})
         ORDER BY seq",
        placeholders(message_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = message_ids.iter().map(|id| id as &dyn ToSql).collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(ReplyRow {
                message_id: row.get(0)?,
                content: row.get(1)?,
                author: identity_row(row, 2)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_message: HashMap<String, Vec<Reply>> = HashMap::new();
    for row in rows {
        let message_id = row.message_id.clone();
        by_message.entry(message_id).or_default().push(row.into_reply()?);
    }
    Ok(by_message)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
