//! Single-writer coordination context.
//!
//! Every mutation of shared state arrives here as a [`Command`] and is applied
//! one at a time by [`Coordinator::run`]. The coordinator owns the registry,
//! the repositories and the broadcaster; nothing else touches them. Handlers
//! never await. Work that can be slow (writing an upload, calling the
//! completion backend) runs on a spawned task and reports back through the
//! same queue, so it cannot hold up anyone else's events.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use huddle_types::events::{ClientCommand, FileDescriptor, ServerEvent};
use huddle_types::models::{
    ConnectionId, ConversationKey, DEFAULT_CHANNEL, DirectMessage, FileId, FileRecord, Identity,
    Message, MessageId, Reply, SearchHit, SearchItem, SearchKind,
};
use huddle_types::store::{
    Change, DirectMessageRepository, FileRepository, MessageRepository, SearchEntry,
    SearchRepository,
};

use crate::broadcaster::{Broadcaster, Outbox, Recipient};
use crate::completion::{CompletionService, FALLBACK_RESPONSE, PromptContext};
use crate::direct::DirectMessageRouter;
use crate::error::GatewayError;
use crate::files::FileCatalog;
use crate::messages::MessageStore;
use crate::registry::ConnectionRegistry;
use crate::search::SearchIndex;
use crate::uploads::{PendingUpload, UploadStore, sanitize_file_name};

const MAX_CONTENT_CHARS: usize = 4000;
const MAX_EMOJI_BYTES: usize = 32;
const MAX_TERM_CHARS: usize = 200;
const MAX_CHANNEL_CHARS: usize = 64;

/// Past messages handed to the assistant as context.
const HISTORY_CONTEXT_LIMIT: usize = 5;
/// Shorter prompt words are not used to look up history.
const MIN_KEYWORD_CHARS: usize = 4;

const UPLOAD_FAILED: &str = "Failed to upload file";

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Messages sent to a newly admitted connection.
    pub snapshot_limit: usize,
    pub search_limit: usize,
    pub completion_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            snapshot_limit: 100,
            search_limit: 50,
            completion_timeout: Duration::from_secs(20),
            queue_capacity: 1024,
        }
    }
}

/// Storage backends owned by the coordinator.
pub struct Repositories {
    pub messages: Box<dyn MessageRepository>,
    pub direct: Box<dyn DirectMessageRepository>,
    pub files: Box<dyn FileRepository>,
    pub search: Box<dyn SearchRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            messages: Box::new(MessageStore::new()),
            direct: Box::new(DirectMessageRouter::new()),
            files: Box::new(FileCatalog::new()),
            search: Box::new(SearchIndex::new()),
        }
    }
}

pub(crate) enum Command {
    Connect {
        identity: Identity,
        outbox: Outbox,
        reply: oneshot::Sender<ConnectionId>,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Client {
        connection_id: ConnectionId,
        command: ClientCommand,
    },
    /// A frame that did not parse as a command.
    Malformed {
        connection_id: ConnectionId,
        detail: String,
    },
    UploadFinished {
        connection_id: ConnectionId,
        result: Result<FileRecord, GatewayError>,
    },
    CompletionFinished {
        connection_id: ConnectionId,
        content: String,
    },
    RecentMessages {
        limit: usize,
        reply: oneshot::Sender<Result<Vec<Message>, GatewayError>>,
    },
    Presence {
        reply: oneshot::Sender<Vec<Identity>>,
    },
    ConnectionCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable front door to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Admit an authenticated identity. The coordinator sends the history
    /// snapshot to `outbox` and announces the join before this returns.
    pub async fn connect(
        &self,
        identity: Identity,
        outbox: Outbox,
    ) -> Result<ConnectionId, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect {
            identity,
            outbox,
            reply,
        })
        .await?;
        rx.await.map_err(|_| GatewayError::CoordinatorStopped)
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let _ = self.send(Command::Disconnect { connection_id }).await;
    }

    pub async fn dispatch(
        &self,
        connection_id: ConnectionId,
        command: ClientCommand,
    ) -> Result<(), GatewayError> {
        self.send(Command::Client {
            connection_id,
            command,
        })
        .await
    }

    /// Report an unparseable frame back to its connection.
    pub async fn reject(&self, connection_id: ConnectionId, detail: String) {
        let _ = self
            .send(Command::Malformed {
                connection_id,
                detail,
            })
            .await;
    }

    /// Most recent messages, oldest first, capped at the snapshot size.
    pub async fn recent_messages(&self, limit: usize) -> Result<Vec<Message>, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RecentMessages { limit, reply }).await?;
        rx.await.map_err(|_| GatewayError::CoordinatorStopped)?
    }

    pub async fn presence(&self) -> Result<Vec<Identity>, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Presence { reply }).await?;
        rx.await.map_err(|_| GatewayError::CoordinatorStopped)
    }

    pub async fn connection_count(&self) -> Result<usize, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ConnectionCount { reply }).await?;
        rx.await.map_err(|_| GatewayError::CoordinatorStopped)
    }

    async fn send(&self, command: Command) -> Result<(), GatewayError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| GatewayError::CoordinatorStopped)
    }
}

#[derive(Debug, Clone, Copy)]
enum ReactionOp {
    Add,
    Remove,
}

pub struct Coordinator {
    registry: ConnectionRegistry,
    broadcaster: Broadcaster,
    messages: Box<dyn MessageRepository>,
    direct: Box<dyn DirectMessageRepository>,
    files: Box<dyn FileRepository>,
    search: Box<dyn SearchRepository>,
    uploads: Arc<UploadStore>,
    completion: Arc<dyn CompletionService>,
    settings: CoordinatorSettings,
    inbox: mpsc::Receiver<Command>,
    /// Weak so the loop still ends once every handle is dropped.
    loopback: mpsc::WeakSender<Command>,
}

impl Coordinator {
    pub fn new(
        repos: Repositories,
        uploads: Arc<UploadStore>,
        completion: Arc<dyn CompletionService>,
        settings: CoordinatorSettings,
    ) -> (Self, CoordinatorHandle) {
        let (tx, inbox) = mpsc::channel(settings.queue_capacity);
        let coordinator = Self {
            registry: ConnectionRegistry::new(),
            broadcaster: Broadcaster::new(),
            messages: repos.messages,
            direct: repos.direct,
            files: repos.files,
            search: repos.search,
            uploads,
            completion,
            settings,
            inbox,
            loopback: tx.downgrade(),
        };
        (coordinator, CoordinatorHandle { tx })
    }

    /// Run the coordinator loop on the current runtime's blocking pool.
    /// Repository calls may hit SQLite, so the loop never occupies an async
    /// worker.
    pub fn start(
        repos: Repositories,
        uploads: Arc<UploadStore>,
        completion: Arc<dyn CompletionService>,
        settings: CoordinatorSettings,
    ) -> CoordinatorHandle {
        let (coordinator, handle) = Self::new(repos, uploads, completion, settings);
        tokio::task::spawn_blocking(move || coordinator.run());
        handle
    }

    /// Apply commands until every handle is gone. Blocks the calling thread,
    /// which must be inside a runtime context for the spawned upload and
    /// completion tasks.
    pub fn run(mut self) {
        info!("Coordinator started");
        while let Some(command) = self.inbox.blocking_recv() {
            self.apply(command);
        }
        info!("Coordinator stopped ({} connections open)", self.registry.len());
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Connect {
                identity,
                outbox,
                reply,
            } => {
                let id = self.connect(identity, outbox);
                if reply.send(id).is_err() {
                    debug!("Connection {} abandoned before admission", id);
                    self.disconnect(id);
                }
            }
            Command::Disconnect { connection_id } => self.disconnect(connection_id),
            Command::Client {
                connection_id,
                command,
            } => self.handle_client(connection_id, command),
            Command::Malformed {
                connection_id,
                detail,
            } => self.report(connection_id, &GatewayError::Validation(detail)),
            Command::UploadFinished {
                connection_id,
                result,
            } => self.finish_upload(connection_id, result),
            Command::CompletionFinished {
                connection_id,
                content,
            } => self.send(
                connection_id,
                ServerEvent::AiResponse {
                    content,
                    timestamp: Utc::now(),
                },
            ),
            Command::RecentMessages { limit, reply } => {
                let limit = limit.min(self.settings.snapshot_limit);
                let _ = reply.send(self.messages.recent(limit).map_err(Into::into));
            }
            Command::Presence { reply } => {
                let _ = reply.send(self.registry.presence());
            }
            Command::ConnectionCount { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    // -- Connections --

    fn connect(&mut self, identity: Identity, outbox: Outbox) -> ConnectionId {
        let id = self.registry.register(identity.clone());
        self.broadcaster.attach(id, outbox);

        let snapshot = match self.messages.recent(self.settings.snapshot_limit) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to load history snapshot for {}: {}", identity, e);
                Vec::new()
            }
        };
        self.send(id, ServerEvent::InitializeMessages(snapshot));

        self.broadcaster.broadcast_all(ServerEvent::UserJoined {
            user: identity.clone(),
            online_users: self.registry.presence(),
        });

        info!(
            "{} joined on connection {} ({} open)",
            identity,
            id,
            self.registry.len()
        );
        id
    }

    fn disconnect(&mut self, connection_id: ConnectionId) {
        self.broadcaster.detach(connection_id);

        let Some(connection) = self.registry.unregister(connection_id) else {
            debug!("Disconnect for unknown connection {}", connection_id);
            return;
        };

        self.broadcaster.broadcast_all(ServerEvent::UserLeft {
            user: connection.identity.clone(),
            online_users: self.registry.presence(),
        });

        info!(
            "{} left connection {} ({} open)",
            connection.identity,
            connection_id,
            self.registry.len()
        );
    }

    // -- Client commands --

    fn handle_client(&mut self, origin: ConnectionId, command: ClientCommand) {
        let Some(identity) = self.registry.get(origin).map(|c| c.identity.clone()) else {
            debug!("Dropping {} from closed connection {}", command.name(), origin);
            return;
        };

        let name = command.name();
        let result = match command {
            ClientCommand::Message {
                content,
                file,
                channel_id,
            } => self.post_message(&identity, content, file, channel_id),
            ClientCommand::DirectMessage { from, to, content } => {
                self.send_direct(origin, &identity, from, to, content)
            }
            ClientCommand::GetDmHistory { from, to } => {
                self.dm_history(origin, &identity, from, to)
            }
            ClientCommand::AddReaction {
                message_id,
                reaction,
                user_id,
            } => self.react(&identity, message_id, reaction, user_id, ReactionOp::Add),
            ClientCommand::RemoveReaction {
                message_id,
                reaction,
                user_id,
            } => self.react(&identity, message_id, reaction, user_id, ReactionOp::Remove),
            ClientCommand::CreateThread { message_id, reply } => {
                self.reply_in_thread(&identity, message_id, reply)
            }
            ClientCommand::ThreadReply {
                message_id,
                content,
            } => self.reply_in_thread(&identity, message_id, content),
            ClientCommand::FileUpload { file_data, file } => {
                self.begin_upload(origin, &identity, file_data, file)
            }
            ClientCommand::Search { term, kind } => self.search(origin, term, kind),
            ClientCommand::AiMessage { content, user_id } => {
                self.ask_assistant(origin, &identity, content, user_id)
            }
        };

        if let Err(e) = result {
            match &e {
                GatewayError::NotFound { .. } => info!("{} {}: {}", identity, name, e),
                GatewayError::Validation(_) => warn!("{} {} rejected: {}", identity, name, e),
                _ => error!("{} {} failed: {}", identity, name, e),
            }
            self.report(origin, &e);
        }
    }

    fn post_message(
        &mut self,
        author: &Identity,
        content: String,
        file: Option<FileId>,
        channel_id: Option<String>,
    ) -> Result<(), GatewayError> {
        let file = match file {
            Some(id) => Some(
                self.files
                    .get(id)?
                    .ok_or_else(|| GatewayError::validation(format!("unknown file {id}")))?,
            ),
            None => None,
        };

        let content = content.trim();
        if content.is_empty() && file.is_none() {
            return Err(GatewayError::validation("message needs content or a file"));
        }
        check_length("message", content)?;

        let channel = match channel_id {
            Some(channel) => validate_channel(&channel)?,
            None => DEFAULT_CHANNEL.to_string(),
        };

        let message = Message::new(channel, author.clone(), content, file);
        self.messages.append(message.clone())?;
        self.index(SearchEntry::for_message(&message));

        debug!("{} posted {} in #{}", author, message.id, message.channel_id);
        self.broadcaster.broadcast_all(ServerEvent::Message(message));
        Ok(())
    }

    fn react(
        &mut self,
        identity: &Identity,
        message_id: MessageId,
        reaction: String,
        claimed: Option<String>,
        op: ReactionOp,
    ) -> Result<(), GatewayError> {
        check_claimed("userId", claimed.as_deref(), identity)?;
        let emoji = validate_emoji(&reaction)?;

        let change = match op {
            ReactionOp::Add => self.messages.add_reaction(message_id, emoji, &identity.id)?,
            ReactionOp::Remove => {
                self.messages
                    .remove_reaction(message_id, emoji, &identity.id)?
            }
        };

        match change {
            Change::Changed(reactions) => {
                self.broadcaster.broadcast_all(ServerEvent::ReactionUpdated {
                    message_id,
                    reactions,
                });
            }
            Change::Unchanged => {
                debug!("{} {:?} {} on {} changed nothing", identity, op, emoji, message_id);
            }
        }
        Ok(())
    }

    fn reply_in_thread(
        &mut self,
        author: &Identity,
        message_id: MessageId,
        content: String,
    ) -> Result<(), GatewayError> {
        let content = validate_text("reply", &content)?;
        let thread = self
            .messages
            .append_reply(message_id, Reply::new(content, author.clone()))?;

        debug!(
            "{} replied on {} ({} replies)",
            author,
            message_id,
            thread.reply_count()
        );
        self.broadcaster
            .broadcast_all(ServerEvent::ThreadUpdated { message_id, thread });
        Ok(())
    }

    fn send_direct(
        &mut self,
        origin: ConnectionId,
        sender: &Identity,
        claimed: Option<String>,
        to: String,
        content: String,
    ) -> Result<(), GatewayError> {
        check_claimed("from", claimed.as_deref(), sender)?;
        let to = validate_recipient(&to)?;
        let content = validate_text("message", &content)?;

        let key = ConversationKey::new(&sender.id, to);
        let entry = DirectMessage {
            content,
            from: sender.id.clone(),
            to: to.to_string(),
            created_at: Utc::now(),
        };
        self.direct.append(&key, entry.clone())?;

        // Recipient's devices first, then the echo to the sending connection.
        let recipients: Vec<ConnectionId> = self
            .registry
            .connections_of(to)
            .into_iter()
            .filter(|id| *id != origin)
            .collect();
        let delivered = self
            .broadcaster
            .send_to_each(recipients, ServerEvent::DirectMessage(entry.clone()));
        self.send(origin, ServerEvent::DirectMessage(entry));

        debug!("{} -> DM {} ({} live connections)", sender, key, delivered);
        Ok(())
    }

    fn dm_history(
        &mut self,
        origin: ConnectionId,
        requester: &Identity,
        claimed: Option<String>,
        to: String,
    ) -> Result<(), GatewayError> {
        check_claimed("from", claimed.as_deref(), requester)?;
        let to = validate_recipient(&to)?;

        let messages = self.direct.history(&ConversationKey::new(&requester.id, to))?;
        self.send(origin, ServerEvent::DmHistory { messages });
        Ok(())
    }

    fn search(
        &mut self,
        origin: ConnectionId,
        term: String,
        kind: SearchKind,
    ) -> Result<(), GatewayError> {
        if term.chars().count() > MAX_TERM_CHARS {
            return Err(GatewayError::validation(format!(
                "search term longer than {MAX_TERM_CHARS} characters"
            )));
        }

        let matches = match self.search.query(&term, kind, self.settings.search_limit) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Search backend failed, answering with no results: {}", e);
                Vec::new()
            }
        };

        let mut hits = Vec::with_capacity(matches.len());
        for m in matches {
            let item = match m.kind {
                SearchKind::Messages => self.messages.get(m.id)?.map(SearchItem::Message),
                SearchKind::Files => self.files.get(m.id)?.map(SearchItem::File),
            };
            if let Some(item) = item {
                hits.push(SearchHit {
                    kind: m.kind,
                    id: m.id,
                    timestamp: m.timestamp,
                    item,
                });
            }
        }

        self.send(origin, ServerEvent::SearchResults(hits));
        Ok(())
    }

    // -- Uploads --

    fn begin_upload(
        &mut self,
        origin: ConnectionId,
        uploader: &Identity,
        descriptor: FileDescriptor,
        payload: String,
    ) -> Result<(), GatewayError> {
        let pending = match self.validate_upload(uploader, descriptor, payload) {
            Ok(pending) => pending,
            Err(e) => {
                warn!("{} upload rejected: {}", uploader, e);
                self.send(
                    origin,
                    ServerEvent::FileUploadError {
                        error: upload_error_text(e),
                    },
                );
                return Ok(());
            }
        };

        let loopback = self
            .loopback
            .upgrade()
            .ok_or(GatewayError::CoordinatorStopped)?;
        let uploads = self.uploads.clone();

        info!("{} uploading {} as {}", uploader, pending.name, pending.id);
        tokio::spawn(async move {
            let result = uploads.store(pending).await;
            let _ = loopback
                .send(Command::UploadFinished {
                    connection_id: origin,
                    result,
                })
                .await;
        });
        Ok(())
    }

    fn validate_upload(
        &self,
        uploader: &Identity,
        descriptor: FileDescriptor,
        payload: String,
    ) -> Result<PendingUpload, GatewayError> {
        let name = sanitize_file_name(&descriptor.name)
            .ok_or_else(|| GatewayError::validation("invalid file name"))?;

        let max = self.uploads.max_size();
        if descriptor.size > max as u64 || payload.len() > self.uploads.max_payload_len() {
            return Err(GatewayError::validation(format!("file exceeds {max} bytes")));
        }
        if payload.trim().is_empty() {
            return Err(GatewayError::validation("empty file"));
        }

        Ok(PendingUpload {
            id: Uuid::new_v4(),
            name,
            mime: descriptor.mime.trim().to_string(),
            payload,
            uploader: uploader.clone(),
        })
    }

    fn finish_upload(&mut self, origin: ConnectionId, result: Result<FileRecord, GatewayError>) {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                if matches!(e, GatewayError::Validation(_)) {
                    warn!("Upload on connection {} rejected: {}", origin, e);
                } else {
                    error!("Upload on connection {} failed: {}", origin, e);
                }
                self.send(
                    origin,
                    ServerEvent::FileUploadError {
                        error: upload_error_text(e),
                    },
                );
                return;
            }
        };

        if let Err(e) = self.files.insert(record.clone()) {
            error!("Failed to record upload {}: {}", record.id, e);
            self.send(
                origin,
                ServerEvent::FileUploadError {
                    error: UPLOAD_FAILED.to_string(),
                },
            );
            return;
        }

        self.index(SearchEntry::for_file(&record));
        self.send(origin, ServerEvent::FileUploadComplete(record));
    }

    // -- Assistant --

    fn ask_assistant(
        &mut self,
        origin: ConnectionId,
        identity: &Identity,
        content: String,
        claimed: Option<String>,
    ) -> Result<(), GatewayError> {
        check_claimed("userId", claimed.as_deref(), identity)?;
        let prompt = validate_text("prompt", &content)?;

        let relevant = self.relevant_history(&prompt);
        let context = PromptContext::new(prompt, &relevant);

        let loopback = self
            .loopback
            .upgrade()
            .ok_or(GatewayError::CoordinatorStopped)?;
        let completion = self.completion.clone();
        let timeout = self.settings.completion_timeout;
        let who = identity.to_string();

        debug!("{} asked the assistant ({} context messages)", who, relevant.len());
        tokio::spawn(async move {
            let content = match tokio::time::timeout(timeout, completion.complete(&context)).await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!("Completion for {} failed: {}", who, e);
                    FALLBACK_RESPONSE.to_string()
                }
                Err(_) => {
                    warn!("Completion for {} timed out after {:?}", who, timeout);
                    FALLBACK_RESPONSE.to_string()
                }
            };
            let _ = loopback
                .send(Command::CompletionFinished {
                    connection_id: origin,
                    content,
                })
                .await;
        });
        Ok(())
    }

    /// Messages matching the prompt's longer words, newest first.
    fn relevant_history(&self, prompt: &str) -> Vec<Message> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        let keywords = prompt
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS);

        for word in keywords {
            match self
                .search
                .query(word, SearchKind::Messages, HISTORY_CONTEXT_LIMIT)
            {
                Ok(hits) => matches.extend(hits.into_iter().filter(|h| seen.insert(h.id))),
                Err(e) => {
                    warn!("History lookup for assistant failed: {}", e);
                    break;
                }
            }
        }

        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(HISTORY_CONTEXT_LIMIT);
        matches
            .into_iter()
            .filter_map(|m| self.messages.get(m.id).ok().flatten())
            .collect()
    }

    // -- Delivery helpers --

    fn send(&self, connection_id: ConnectionId, event: ServerEvent) {
        self.broadcaster
            .send_to(&self.registry, Recipient::Connection(connection_id), event);
    }

    fn report(&self, connection_id: ConnectionId, err: &GatewayError) {
        let message = match err {
            GatewayError::NotFound { .. } | GatewayError::Validation(_) => err.to_string(),
            _ => "internal error".to_string(),
        };
        self.send(
            connection_id,
            ServerEvent::Error {
                kind: err.kind(),
                message,
            },
        );
    }

    fn index(&mut self, entry: SearchEntry) {
        let id = entry.id;
        if let Err(e) = self.search.index(entry) {
            warn!("Search index update for {} failed: {}", id, e);
        }
    }
}

/// Text a failed upload reports to its uploader: the bare reason for a
/// rejected upload, a fixed message for anything else.
fn upload_error_text(err: GatewayError) -> String {
    match err {
        GatewayError::Validation(reason) => reason,
        _ => UPLOAD_FAILED.to_string(),
    }
}

// -- Validation --

fn check_length(field: &str, text: &str) -> Result<(), GatewayError> {
    if text.chars().count() > MAX_CONTENT_CHARS {
        return Err(GatewayError::validation(format!(
            "{field} longer than {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_text(field: &str, text: &str) -> Result<String, GatewayError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GatewayError::validation(format!("{field} must not be empty")));
    }
    check_length(field, text)?;
    Ok(text.to_string())
}

fn validate_emoji(reaction: &str) -> Result<&str, GatewayError> {
    let emoji = reaction.trim();
    if emoji.is_empty() || emoji.len() > MAX_EMOJI_BYTES {
        return Err(GatewayError::validation("invalid reaction"));
    }
    Ok(emoji)
}

fn validate_channel(channel: &str) -> Result<String, GatewayError> {
    let channel = channel.trim();
    if channel.is_empty() || channel.chars().count() > MAX_CHANNEL_CHARS {
        return Err(GatewayError::validation("invalid channel"));
    }
    Ok(channel.to_string())
}

fn validate_recipient(to: &str) -> Result<&str, GatewayError> {
    let to = to.trim();
    if to.is_empty() {
        return Err(GatewayError::validation("recipient must not be empty"));
    }
    Ok(to)
}

/// Client-sent identity fields are optional, but must name the caller.
fn check_claimed(
    field: &str,
    claimed: Option<&str>,
    identity: &Identity,
) -> Result<(), GatewayError> {
    match claimed {
        Some(id) if id != identity.id => Err(GatewayError::validation(format!(
            "{field} does not match the connection's identity"
        ))),
        _ => Ok(()),
    }
}
