use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Identity ids come from the login flow. OAuth subjects are opaque strings,
/// guests get a UUID rendered as a string.
pub type IdentityId = String;
pub type ConnectionId = Uuid;
pub type MessageId = Uuid;
pub type FileId = Uuid;

/// Channel used when a client does not name one.
pub const DEFAULT_CHANNEL: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Oauth,
    Guest,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oauth => "oauth",
            Self::Guest => "guest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "oauth" => Some(Self::Oauth),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }
}

/// An authenticated participant, as issued by the login flow. Never mutated
/// by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub kind: IdentityKind,
}

impl Identity {
    /// Mint a fresh guest identity with a random id.
    pub fn guest(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            avatar: None,
            kind: IdentityKind::Guest,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

// -- Reactions --

/// Emoji -> set of reactor identity ids.
///
/// An emoji key is present only while its reactor set is non-empty; `add` and
/// `remove` are the only mutators and both keep that true. Deserialization
/// drops empty sets for the same reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, BTreeSet<IdentityId>>")]
pub struct Reactions(BTreeMap<String, BTreeSet<IdentityId>>);

impl Reactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the reactor was not already present.
    pub fn add(&mut self, emoji: &str, identity_id: &str) -> bool {
        self.0
            .entry(emoji.to_string())
            .or_default()
            .insert(identity_id.to_string())
    }

    /// Returns `true` if the reactor was present and has been removed.
    pub fn remove(&mut self, emoji: &str, identity_id: &str) -> bool {
        let Some(reactors) = self.0.get_mut(emoji) else {
            return false;
        };
        let removed = reactors.remove(identity_id);
        if reactors.is_empty() {
            self.0.remove(emoji);
        }
        removed
    }

    pub fn contains(&self, emoji: &str, identity_id: &str) -> bool {
        self.0
            .get(emoji)
            .is_some_and(|reactors| reactors.contains(identity_id))
    }

    pub fn reactors(&self, emoji: &str) -> Option<&BTreeSet<IdentityId>> {
        self.0.get(emoji)
    }

    pub fn emojis(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct emoji.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<BTreeMap<String, BTreeSet<IdentityId>>> for Reactions {
    fn from(mut map: BTreeMap<String, BTreeSet<IdentityId>>) -> Self {
        map.retain(|_, reactors| !reactors.is_empty());
        Self(map)
    }
}

// -- Threads --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub content: String,
    pub author: Identity,
    pub created_at: DateTime<Utc>,
}

impl Reply {
    pub fn new(content: impl Into<String>, author: Identity) -> Self {
        Self {
            content: content.into(),
            author,
            created_at: Utc::now(),
        }
    }
}

/// Replies to a message, oldest first.
///
/// There is no stored counter: `reply_count` is the length of the list, and
/// that is also what goes out on the wire as `replyCount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Thread {
    #[serde(default)]
    replies: Vec<Reply>,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_replies(replies: Vec<Reply>) -> Self {
        Self { replies }
    }

    pub fn push(&mut self, reply: Reply) {
        self.replies.push(reply);
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }
}

impl Serialize for Thread {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Thread", 2)?;
        state.serialize_field("replies", &self.replies)?;
        state.serialize_field("replyCount", &self.reply_count())?;
        state.end()
    }
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub channel_id: String,
    pub author: Identity,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub file: Option<FileRecord>,
    #[serde(default)]
    pub reactions: Reactions,
    /// Created on the first reply.
    #[serde(default)]
    pub thread: Option<Thread>,
}

impl Message {
    /// A new message with a fresh id, no reactions and no thread.
    pub fn new(
        channel_id: impl Into<String>,
        author: Identity,
        content: impl Into<String>,
        file: Option<FileRecord>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            author,
            content: content.into(),
            created_at: Utc::now(),
            file,
            reactions: Reactions::new(),
            thread: None,
        }
    }

    /// Append a reply, creating the thread if this is the first one.
    pub fn push_reply(&mut self, reply: Reply) -> &Thread {
        let thread = self.thread.get_or_insert_with(Thread::new);
        thread.push(reply);
        thread
    }
}

// -- Direct messages --

/// Canonical key for a two-party conversation: the ids are stored sorted, so
/// `ConversationKey::new(a, b) == ConversationKey::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey {
    low: IdentityId,
    high: IdentityId,
}

impl ConversationKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub content: String,
    pub from: IdentityId,
    pub to: IdentityId,
    pub created_at: DateTime<Utc>,
}

// -- Files --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    /// File name inside the public upload directory.
    pub storage_path: String,
    pub size: u64,
    pub mime: String,
    pub uploader: Identity,
    pub url: String,
    /// Hex SHA-256 of the stored bytes.
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

// -- Search --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Messages,
    Files,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Files => "files",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchItem {
    Message(Message),
    File(FileRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub kind: SearchKind,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub item: SearchItem,
}
