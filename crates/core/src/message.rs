//! Message domain types.
//!
//! Messages flow through the whole agent side of the system:
//! a user turn or tool output is collected → stored in the history →
//! selected by the context assembler → sent to the completion provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions, interpreter output, observations
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// How the context assembler treats a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Always included, rendered as a template on every turn.
    Header,
    /// Conversational history, included newest-first under the token budget.
    Queued,
    /// Ephemeral observation that decays according to `lasting`.
    Temp,
}

/// A single message in the agent's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// Sender display name (e.g. "User", "Interpreter", "Retrieval")
    pub name: String,

    /// The text content
    pub content: String,

    /// Header, queued or temp
    pub kind: MessageKind,

    /// Decay counter: 0 = permanent, 1 = dropped at the next decay pass,
    /// N > 1 = decremented at each pass.
    #[serde(default)]
    pub lasting: u32,

    /// Creation time, used to order non-header messages in the context
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with every field spelled out.
    pub fn new(
        role: Role,
        name: impl Into<String>,
        content: impl Into<String>,
        kind: MessageKind,
        lasting: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            name: name.into(),
            content: content.into(),
            kind,
            lasting,
            timestamp: Utc::now(),
        }
    }

    /// Create a queued user message.
    pub fn user(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::User, name, content, MessageKind::Queued, 0)
    }

    /// Create a queued assistant message.
    pub fn assistant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, name, content, MessageKind::Queued, 0)
    }

    /// Create a queued system message (interpreter output, tracebacks).
    pub fn system(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::System, name, content, MessageKind::Queued, 0)
    }

    /// Create a permanent system header.
    pub fn header(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::System, name, content, MessageKind::Header, 0)
    }

    /// Create a decaying system observation.
    pub fn temp(name: impl Into<String>, content: impl Into<String>, lasting: u32) -> Self {
        Self::new(Role::System, name, content, MessageKind::Temp, lasting)
    }

    /// Replace the timestamp (used when ordering needs to be pinned).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
