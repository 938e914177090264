use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use huddle_db::{Database, SqliteDirectMessages, SqliteFiles, SqliteMessages, SqliteSearch};
use huddle_types::models::{
    ConversationKey, DEFAULT_CHANNEL, DirectMessage, FileRecord, Identity, Message, Reply,
    SearchKind,
};
use huddle_types::store::{
    Change, DirectMessageRepository, FileRepository, MessageRepository, SearchEntry,
    SearchRepository, StoreError,
};

fn db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().unwrap())
}

fn message(author: &Identity, content: &str) -> Message {
    Message::new(DEFAULT_CHANNEL, author.clone(), content, None)
}

fn file(uploader: &Identity, name: &str) -> FileRecord {
    let id = Uuid::new_v4();
    FileRecord {
        id,
        name: name.into(),
        storage_path: format!("{id}-{name}"),
        size: 5,
        mime: "text/plain".into(),
        uploader: uploader.clone(),
        url: format!("/uploads/{id}-{name}"),
        sha256: "00".repeat(32),
        created_at: Utc::now(),
    }
}

#[test]
fn recent_returns_tail_in_append_order() {
    let mut messages = SqliteMessages::new(db());
    let ann = Identity::guest("ann");
    for i in 0..8 {
        messages.append(message(&ann, &format!("m{i}"))).unwrap();
    }

    let recent = messages.recent(3).unwrap();
    let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["m5", "m6", "m7"]);
    assert_eq!(recent[0].author, ann);
}

#[test]
fn reaction_round_trip_and_idempotence() {
    let mut messages = SqliteMessages::new(db());
    let ann = Identity::guest("ann");
    let m = message(&ann, "hello");
    messages.append(m.clone()).unwrap();

    let Change::Changed(after_add) = messages.add_reaction(m.id, "👍", &ann.id).unwrap() else {
        panic!("first add must change state");
    };
    assert!(after_add.contains("👍", &ann.id));
    assert!(matches!(
        messages.add_reaction(m.id, "👍", &ann.id).unwrap(),
        Change::Unchanged
    ));

    let Change::Changed(after_remove) = messages.remove_reaction(m.id, "👍", &ann.id).unwrap()
    else {
        panic!("remove of present reaction must change state");
    };
    assert!(after_remove.is_empty());
    assert!(matches!(
        messages.remove_reaction(m.id, "👍", &ann.id).unwrap(),
        Change::Unchanged
    ));
    assert!(messages.get(m.id).unwrap().unwrap().reactions.is_empty());
}

#[test]
fn threads_are_created_on_first_reply() {
    let mut messages = SqliteMessages::new(db());
    let (ann, bob) = (Identity::guest("ann"), Identity::guest("bob"));
    let m = message(&ann, "lunch?");
    messages.append(m.clone()).unwrap();
    assert!(messages.get(m.id).unwrap().unwrap().thread.is_none());

    messages.append_reply(m.id, Reply::new("sure", bob.clone())).unwrap();
    let thread = messages.append_reply(m.id, Reply::new("noon", ann.clone())).unwrap();
    assert_eq!(thread.reply_count(), 2);
    assert_eq!(thread.replies()[0].author, bob);

    let stored = messages.get(m.id).unwrap().unwrap();
    assert_eq!(stored.thread.unwrap().reply_count(), 2);
}

#[test]
fn unknown_message_is_not_found() {
    let mut messages = SqliteMessages::new(db());
    let ann = Identity::guest("ann");
    let missing = Uuid::new_v4();

    assert!(matches!(
        messages.add_reaction(missing, "👍", &ann.id),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        messages.append_reply(missing, Reply::new("hi", ann)),
        Err(StoreError::NotFound { .. })
    ));
    assert!(messages.get(missing).unwrap().is_none());
}

#[test]
fn conversation_history_is_symmetric() {
    let mut dms = SqliteDirectMessages::new(db());
    let (a, b) = ("alice", "bob");
    let entry = |from: &str, to: &str, content: &str| DirectMessage {
        content: content.into(),
        from: from.into(),
        to: to.into(),
        created_at: Utc::now(),
    };

    dms.append(&ConversationKey::new(a, b), entry(a, b, "hi")).unwrap();
    dms.append(&ConversationKey::new(b, a), entry(b, a, "yo")).unwrap();

    let ab = dms.history(&ConversationKey::new(a, b)).unwrap();
    let ba = dms.history(&ConversationKey::new(b, a)).unwrap();
    assert_eq!(ab, ba);
    let contents: Vec<_> = ab.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["hi", "yo"]);
    assert!(dms.history(&ConversationKey::new(a, "carol")).unwrap().is_empty());
}

#[test]
fn attached_files_load_with_their_message() {
    let db = db();
    let mut files = SqliteFiles::new(db.clone());
    let mut messages = SqliteMessages::new(db);
    let ann = Identity::guest("ann");

    let record = file(&ann, "notes.txt");
    files.insert(record.clone()).unwrap();
    assert_eq!(files.get(record.id).unwrap().unwrap().name, "notes.txt");

    let m = Message::new(DEFAULT_CHANNEL, ann, "", Some(record.clone()));
    messages.append(m.clone()).unwrap();
    let stored = messages.get(m.id).unwrap().unwrap();
    let attached = stored.file.unwrap();
    assert_eq!(attached.id, record.id);
    assert_eq!(attached.uploader, record.uploader);
}

#[test]
fn search_is_case_insensitive_newest_first() {
    let mut search = SqliteSearch::new(db());
    let entry = |blob: &str, age: i64| SearchEntry {
        id: Uuid::new_v4(),
        kind: SearchKind::Messages,
        blob: blob.to_lowercase(),
        timestamp: Utc::now() - Duration::seconds(age),
    };

    let old = entry("Hello World ann", 60);
    let new = entry("world peace bob", 1);
    search.index(old.clone()).unwrap();
    search.index(new.clone()).unwrap();
    search.index(entry("unrelated", 0)).unwrap();

    let ids: Vec<_> = search
        .query("WORLD", SearchKind::Messages, 50)
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![new.id, old.id]);
    assert!(search.query("world", SearchKind::Files, 50).unwrap().is_empty());
    assert!(search.query("  ", SearchKind::Messages, 50).unwrap().is_empty());
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huddle.db");
    let ann = Identity::guest("ann");
    let m = message(&ann, "persisted");

    {
        let mut messages = SqliteMessages::new(Arc::new(Database::open(&path).unwrap()));
        messages.append(m.clone()).unwrap();
        messages.add_reaction(m.id, "🎉", &ann.id).unwrap();
    }

    let messages = SqliteMessages::new(Arc::new(Database::open(&path).unwrap()));
    let stored = messages.get(m.id).unwrap().unwrap();
    assert_eq!(stored.content, "persisted");
    assert!(stored.reactions.contains("🎉", &ann.id));
}
