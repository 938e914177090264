/// Database row types. These map directly to SQLite rows.
/// Distinct from huddle-types models to keep the DB layer independent.
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use huddle_types::models::{DirectMessage, FileRecord, Identity, IdentityKind, Message, Reply};

/// Fixed-width RFC 3339, so text order is time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("bad timestamp {raw:?}"))?
        .with_timezone(&Utc))
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("bad id {raw:?}"))
}

/// The identity columns shared by messages, replies and files.
pub struct IdentityRow {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub kind: String,
}

impl IdentityRow {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.display_name.clone(),
            avatar: identity.avatar.clone(),
            kind: identity.kind.as_str().to_string(),
        }
    }

    pub fn into_identity(self) -> Result<Identity> {
        let kind = IdentityKind::parse(&self.kind)
            .ok_or_else(|| anyhow!("bad identity kind {:?}", self.kind))?;
        Ok(Identity {
            id: self.id,
            display_name: self.name,
            avatar: self.avatar,
            kind,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub author: IdentityRow,
    pub content: String,
    pub file: Option<FileRow>,
    pub created_at: String,
}

impl MessageRow {
    /// Reactions and thread are attached by the caller.
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: parse_id(&self.id)?,
            channel_id: self.channel_id,
            author: self.author.into_identity()?,
            content: self.content,
            created_at: parse_timestamp(&self.created_at)?,
            file: self.file.map(FileRow::into_record).transpose()?,
            reactions: Default::default(),
            thread: None,
        })
    }
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
}

pub struct ReplyRow {
    pub message_id: String,
    pub content: String,
    pub author: IdentityRow,
    pub created_at: String,
}

impl ReplyRow {
    pub fn into_reply(self) -> Result<Reply> {
        Ok(Reply {
            content: self.content,
            author: self.author.into_identity()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct DirectMessageRow {
    pub from_id: String,
    pub to_id: String,
    pub content: String,
    pub created_at: String,
}

impl DirectMessageRow {
    pub fn into_direct_message(self) -> Result<DirectMessage> {
        Ok(DirectMessage {
            content: self.content,
            from: self.from_id,
            to: self.to_id,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct FileRow {
    pub id: String,
    pub name: String,
    pub storage_path: String,
    pub size: i64,
    pub mime: String,
    pub uploader: IdentityRow,
    pub url: String,
    pub sha256: String,
    pub created_at: String,
}

impl FileRow {
    pub fn into_record(self) -> Result<FileRecord> {
        Ok(FileRecord {
            id: parse_id(&self.id)?,
            name: self.name,
            storage_path: self.storage_path,
            size: u64::try_from(self.size).context("negative file size")?,
            mime: self.mime,
            uploader: self.uploader.into_identity()?,
            url: self.url,
            sha256: self.sha256,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
