//! Text-completion backend used by the assistant.
//!
//! The coordinator never awaits a completion itself: it builds the
//! [`PromptContext`], hands it to a spawned task bounded by a timeout, and
//! gets the text (or the fallback) back through its own command queue.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use huddle_types::models::Message;

use crate::error::GatewayError;

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a chat application. \
You have access to the chat history and can reference past conversations to provide \
context-aware responses. Always be friendly and conversational in your tone. When \
referencing past messages, you can quote them directly and cite who said them. Be concise \
but informative, ask clarifying questions if needed, and be honest if you're unsure \
about something.";

/// Sent instead of a completion when the backend fails or times out.
pub const FALLBACK_RESPONSE: &str = "I'm currently operating in basic mode without access \
to message history. How can I help you?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub system: String,
    /// Relevant history lines, newest first.
    pub history: Vec<String>,
    pub prompt: String,
}

impl PromptContext {
    pub fn new(prompt: impl Into<String>, relevant: &[Message]) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            history: relevant.iter().map(format_history_line).collect(),
            prompt: prompt.into(),
        }
    }

    /// Chat-completions message list.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(&self.system)];
        if !self.history.is_empty() {
            messages.push(ChatMessage::system(format!(
                "Here are some relevant messages from the chat history:\n{}",
                self.history.join("\n")
            )));
        }
        messages.push(ChatMessage {
            role: "user".into(),
            content: self.prompt.clone(),
        });
        messages
    }
}

fn format_history_line(message: &Message) -> String {
    format!(
        "[{} at {}]: {}",
        message.author.display_name,
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.content
    )
}

pub trait CompletionService: Send + Sync {
    fn complete<'a>(&'a self, context: &'a PromptContext) -> BoxFuture<'a, Result<String, GatewayError>>;
}

/// Used when no backend is configured. Always unavailable, so callers fall
/// back.
pub struct DisabledCompletion;

impl CompletionService for DisabledCompletion {
    fn complete<'a>(&'a self, _context: &'a PromptContext) -> BoxFuture<'a, Result<String, GatewayError>> {
        Box::pin(async {
            Err(GatewayError::ExternalServiceUnavailable(
                "completion backend not configured".into(),
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
            model: model.into(),
        }
    }
}

impl CompletionService for OpenAiCompletion {
    fn complete<'a>(&'a self, context: &'a PromptContext) -> BoxFuture<'a, Result<String, GatewayError>> {
        Box::pin(async move {
            let body = ChatRequest {
                model: &self.model,
                messages: context.to_chat_messages(),
                temperature: 0.7,
                max_tokens: 500,
            };

            let mut req = self.client.post(&self.url).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| GatewayError::ExternalServiceUnavailable(e.to_string()))?;

            let parsed: ChatResponse = resp
                .json()
                .await
                .map_err(|e| GatewayError::ExternalServiceUnavailable(e.to_string()))?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    GatewayError::ExternalServiceUnavailable("empty completion".into())
                })?;

            debug!("Completion returned {} chars", content.len());
            Ok(content)
        })
    }
}
