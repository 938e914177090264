use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    DirectMessage, FileId, FileRecord, Identity, IdentityId, Message, MessageId, Reactions,
    SearchHit, SearchKind, Thread,
};

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    /// Post to a channel, optionally attaching a previously uploaded file
    Message {
        #[serde(default)]
        content: String,
        #[serde(default)]
        file: Option<FileId>,
        #[serde(default)]
        channel_id: Option<String>,
    },

    /// Send a direct message. `from`, when present, must be the caller.
    DirectMessage {
        #[serde(default)]
        from: Option<IdentityId>,
        to: IdentityId,
        content: String,
    },

    /// Fetch the full conversation between the caller and `to`
    GetDmHistory {
        #[serde(default)]
        from: Option<IdentityId>,
        to: IdentityId,
    },

    AddReaction {
        message_id: MessageId,
        reaction: String,
        #[serde(default)]
        user_id: Option<IdentityId>,
    },

    RemoveReaction {
        message_id: MessageId,
        reaction: String,
        #[serde(default)]
        user_id: Option<IdentityId>,
    },

    /// Start a thread with its first reply
    CreateThread { message_id: MessageId, reply: String },

    /// Reply in a thread. Client-sent `sender` and `timestamp` fields are
    /// ignored; the server stamps both.
    ThreadReply { message_id: MessageId, content: String },

    /// Upload a file. `file` is a data URL or bare base64.
    FileUpload { file_data: FileDescriptor, file: String },

    Search {
        term: String,
        #[serde(rename = "type")]
        kind: SearchKind,
    },

    /// Ask the assistant. `userId`, when present, must be the caller.
    AiMessage {
        content: String,
        #[serde(default)]
        user_id: Option<IdentityId>,
    },
}

impl ClientCommand {
    /// Wire name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::DirectMessage { .. } => "direct-message",
            Self::GetDmHistory { .. } => "get-dm-history",
            Self::AddReaction { .. } => "add-reaction",
            Self::RemoveReaction { .. } => "remove-reaction",
            Self::CreateThread { .. } => "create-thread",
            Self::ThreadReply { .. } => "thread-reply",
            Self::FileUpload { .. } => "file-upload",
            Self::Search { .. } => "search",
            Self::AiMessage { .. } => "ai-message",
        }
    }
}

/// Client-declared metadata for an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime: String,
    #[serde(default)]
    pub size: u64,
}

/// Events sent FROM server TO clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Recent history, oldest first, sent once to a newly admitted connection
    InitializeMessages(Vec<Message>),

    /// A new channel message
    Message(Message),

    #[serde(rename = "userJoined")]
    UserJoined {
        user: Identity,
        online_users: Vec<Identity>,
    },

    #[serde(rename = "userLeft")]
    UserLeft {
        user: Identity,
        online_users: Vec<Identity>,
    },

    /// Full post-mutation reaction map of one message
    ReactionUpdated {
        message_id: MessageId,
        reactions: Reactions,
    },

    /// Full thread of one message
    ThreadUpdated { message_id: MessageId, thread: Thread },

    FileUploadComplete(FileRecord),

    FileUploadError { error: String },

    /// A direct message delivered to the recipient, or echoed to the sender
    DirectMessage(DirectMessage),

    DmHistory { messages: Vec<DirectMessage> },

    SearchResults(Vec<SearchHit>),

    AiResponse {
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// A rejected command, reported to the originating connection only
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_reaction_command() {
        let raw = json!({
            "type": "add-reaction",
            "data": {
                "messageId": "6f1c2a4e-8f1b-4a53-9d1c-0c2a6f0b5e11",
                "reaction": "👍",
                "userId": "alice"
            }
        });
        let cmd: ClientCommand = serde_json::from_value(raw).unwrap();
        match cmd {
            ClientCommand::AddReaction {
                reaction, user_id, ..
            } => {
                assert_eq!(reaction, "👍");
                assert_eq!(user_id.as_deref(), Some("alice"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn thread_reply_ignores_client_stamps() {
        let raw = json!({
            "type": "thread-reply",
            "data": {
                "messageId": "6f1c2a4e-8f1b-4a53-9d1c-0c2a6f0b5e11",
                "content": "agreed",
                "sender": { "id": "x", "name": "X" },
                "timestamp": "2024-01-01T00:00:00Z"
            }
        });
        let cmd: ClientCommand = serde_json::from_value(raw).unwrap();
        assert_eq!(cmd.name(), "thread-reply");
    }

    #[test]
    fn parses_search_and_upload() {
        let search: ClientCommand = serde_json::from_value(json!({
            "type": "search",
            "data": { "term": "world", "type": "messages" }
        }))
        .unwrap();
        assert!(matches!(
            search,
            ClientCommand::Search { kind: SearchKind::Messages, .. }
        ));

        let upload: ClientCommand = serde_json::from_value(json!({
            "type": "file-upload",
            "data": {
                "fileData": { "name": "a.txt", "type": "text/plain", "size": 2 },
                "file": "data:text/plain;base64,aGk="
            }
        }))
        .unwrap();
        match upload {
            ClientCommand::FileUpload { file_data, .. } => {
                assert_eq!(file_data.mime, "text/plain");
                assert_eq!(file_data.size, 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn presence_events_use_camel_case_names() {
        let user = Identity::guest("ann");
        let event = ServerEvent::UserJoined {
            user: user.clone(),
            online_users: vec![user],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "userJoined");
        assert_eq!(json["data"]["onlineUsers"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn error_event_shape() {
        let event = ServerEvent::Error {
            kind: ErrorKind::NotFound,
            message: "message 1 not found".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["kind"], "not-found");
    }
}
