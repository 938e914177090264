//! Repository implementations over one shared [`Database`].
//!
//! Each repository holds an `Arc<Database>`; the coordinator owns them and is
//! the only writer, so the connection mutex is never contended in practice.

use std::sync::Arc;

use huddle_types::models::{
    ConversationKey, DirectMessage, FileId, FileRecord, Message, MessageId, Reactions, Reply,
    SearchKind, Thread,
};
use huddle_types::store::{
    Change, DirectMessageRepository, FileRepository, MessageRepository, SearchEntry, SearchMatch,
    SearchRepository, StoreError, StoreResult, normalize_term,
};

use crate::Database;

fn backend(err: anyhow::Error) -> StoreError {
    StoreError::Backend(format!("{err:#}"))
}

fn change((changed, reactions): (bool, Reactions)) -> Change<Reactions> {
    if changed {
        Change::Changed(reactions)
    } else {
        Change::Unchanged
    }
}

pub struct SqliteMessages {
    db: Arc<Database>,
}

impl SqliteMessages {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl MessageRepository for SqliteMessages {
    fn append(&mut self, message: Message) -> StoreResult<()> {
        self.db.insert_message(&message).map_err(backend)
    }

    fn get(&self, id: MessageId) -> StoreResult<Option<Message>> {
        self.db.get_message(id).map_err(backend)
    }

    fn recent(&self, limit: usize) -> StoreResult<Vec<Message>> {
        self.db.recent_messages(limit).map_err(backend)
    }

    fn add_reaction(
        &mut self,
        id: MessageId,
        emoji: &str,
        identity_id: &str,
    ) -> StoreResult<Change<Reactions>> {
        self.db
            .add_reaction(id, emoji, identity_id)
            .map_err(backend)?
            .map(change)
            .ok_or_else(|| StoreError::message_not_found(id))
    }

    fn remove_reaction(
        &mut self,
        id: MessageId,
        emoji: &str,
        identity_id: &str,
    ) -> StoreResult<Change<Reactions>> {
        self.db
            .remove_reaction(id, emoji, identity_id)
            .map_err(backend)?
            .map(change)
            .ok_or_else(|| StoreError::message_not_found(id))
    }

    fn append_reply(&mut self, id: MessageId, reply: Reply) -> StoreResult<Thread> {
        self.db
            .insert_reply(id, &reply)
            .map_err(backend)?
            .ok_or_else(|| StoreError::message_not_found(id))
    }
}

pub struct SqliteDirectMessages {
    db: Arc<Database>,
}

impl SqliteDirectMessages {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl DirectMessageRepository for SqliteDirectMessages {
    fn append(&mut self, key: &ConversationKey, entry: DirectMessage) -> StoreResult<()> {
        self.db.insert_direct_message(key, &entry).map_err(backend)
    }

    fn history(&self, key: &ConversationKey) -> StoreResult<Vec<DirectMessage>> {
        self.db.get_conversation(key).map_err(backend)
    }
}

pub struct SqliteFiles {
    db: Arc<Database>,
}

impl SqliteFiles {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl FileRepository for SqliteFiles {
    fn insert(&mut self, record: FileRecord) -> StoreResult<()> {
        self.db.insert_file(&record).map_err(backend)
    }

    fn get(&self, id: FileId) -> StoreResult<Option<FileRecord>> {
        self.db.get_file(id).map_err(backend)
    }
}

pub struct SqliteSearch {
    db: Arc<Database>,
}

impl SqliteSearch {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl SearchRepository for SqliteSearch {
    fn index(&mut self, entry: SearchEntry) -> StoreResult<()> {
        self.db.upsert_search_entry(&entry).map_err(backend)
    }

    fn query(&self, term: &str, kind: SearchKind, limit: usize) -> StoreResult<Vec<SearchMatch>> {
        let Some(term) = normalize_term(term) else {
            return Ok(Vec::new());
        };
        self.db.search_entries(&term, kind, limit).map_err(backend)
    }
}
