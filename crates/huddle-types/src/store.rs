//! Repository interfaces owned by the coordinator.
//!
//! The gateway ships in-memory implementations and huddle-db ships SQLite
//! ones. All methods are synchronous: the coordinator calls them from its
//! single task and expects them to return quickly.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ConversationKey, DirectMessage, FileId, FileRecord, Message, MessageId, Reactions, Reply,
    SearchKind, Thread,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn message_not_found(id: MessageId) -> Self {
        Self::NotFound {
            what: "message",
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an idempotent mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    /// State changed; carries the full post-mutation value.
    Changed(T),
    /// The mutation was a no-op.
    Unchanged,
}

pub trait MessageRepository: Send {
    /// Store a message at the end of the log. The id must be fresh.
    fn append(&mut self, message: Message) -> StoreResult<()>;

    fn get(&self, id: MessageId) -> StoreResult<Option<Message>>;

    /// The last `limit` messages, oldest first.
    fn recent(&self, limit: usize) -> StoreResult<Vec<Message>>;

    fn add_reaction(
        &mut self,
        id: MessageId,
        emoji: &str,
        identity_id: &str,
    ) -> StoreResult<Change<Reactions>>;

    fn remove_reaction(
        &mut self,
        id: MessageId,
        emoji: &str,
        identity_id: &str,
    ) -> StoreResult<Change<Reactions>>;

    /// Append to the message's thread, creating it on first reply. Returns
    /// the full thread.
    fn append_reply(&mut self, id: MessageId, reply: Reply) -> StoreResult<Thread>;
}

pub trait DirectMessageRepository: Send {
    fn append(&mut self, key: &ConversationKey, entry: DirectMessage) -> StoreResult<()>;

    /// Whole conversation, oldest first. Empty if the pair never talked.
    fn history(&self, key: &ConversationKey) -> StoreResult<Vec<DirectMessage>>;
}

pub trait FileRepository: Send {
    fn insert(&mut self, record: FileRecord) -> StoreResult<()>;

    fn get(&self, id: FileId) -> StoreResult<Option<FileRecord>>;
}

pub trait SearchRepository: Send {
    fn index(&mut self, entry: SearchEntry) -> StoreResult<()>;

    /// Items of `kind` whose blob contains `term` (case-insensitive), newest
    /// first, at most `limit`. A blank term matches nothing.
    fn query(&self, term: &str, kind: SearchKind, limit: usize) -> StoreResult<Vec<SearchMatch>>;
}

/// What the search index stores per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub id: Uuid,
    pub kind: SearchKind,
    /// Lower-cased searchable text.
    pub blob: String,
    pub timestamp: DateTime<Utc>,
}

impl SearchEntry {
    /// Content plus author display name.
    pub fn for_message(message: &Message) -> Self {
        Self {
            id: message.id,
            kind: SearchKind::Messages,
            blob: format!("{} {}", message.content, message.author.display_name).to_lowercase(),
            timestamp: message.created_at,
        }
    }

    /// File name plus uploader display name.
    pub fn for_file(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            kind: SearchKind::Files,
            blob: format!("{} {}", record.name, record.uploader.display_name).to_lowercase(),
            timestamp: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub id: Uuid,
    pub kind: SearchKind,
    pub timestamp: DateTime<Utc>,
}

/// Trim and lower-case a query term. `None` when nothing is left.
pub fn normalize_term(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        None
    } else {
        Some(term.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_CHANNEL, Identity};

    #[test]
    fn message_blob_includes_author() {
        let message = Message::new(DEFAULT_CHANNEL, Identity::guest("Ann"), "Hello World", None);
        let entry = SearchEntry::for_message(&message);
        assert_eq!(entry.blob, "hello world ann");
        assert_eq!(entry.kind, SearchKind::Messages);
    }

    #[test]
    fn blank_terms_normalize_to_none() {
        assert_eq!(normalize_term("   "), None);
        assert_eq!(normalize_term(" WoRLD "), Some("world".to_string()));
    }
}
