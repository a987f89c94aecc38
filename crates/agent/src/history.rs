//! Message history and decay.
//!
//! Every message the agent sees lives here: headers, conversational turns,
//! and temporary observations. `lasting` drives retention:
//! 0 keeps a message forever, 1 drops it at the next decay pass, and N > 1
//! counts down once per pass.

use cairn_core::message::{Message, MessageKind, Role};
use cairn_core::token;
use tracing::trace;

/// Appended to assistant turns; also the completion stop sequence.
pub const STOP_MARKER: &str = "#SUBMIT#";

/// Ordered store of every message in a session.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    messages: Vec<Message>,
    max_message_tokens: usize,
}

impl MessageHistory {
    pub fn new(max_message_tokens: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_message_tokens,
        }
    }

    /// Append a message.
    ///
    /// Content is trimmed and truncated to the per-message token cap;
    /// assistant turns get the stop marker on a new line.
    pub fn add(&mut self, mut message: Message) {
        message.content = token::truncate(message.content.trim(), self.max_message_tokens);
        if message.role == Role::Assistant {
            message.content.push('\n');
            message.content.push_str(STOP_MARKER);
        }
        trace!(name = %message.name, kind = ?message.kind, "Message added");
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages of one kind, oldest first.
    pub fn of_kind(&self, kind: MessageKind) -> impl DoubleEndedIterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.kind == kind)
    }

    /// The last `n` queued messages, oldest first.
    pub fn last_queued(&self, n: usize) -> Vec<&Message> {
        let mut last: Vec<&Message> = self.of_kind(MessageKind::Queued).rev().take(n).collect();
        last.reverse();
        last
    }

    /// Apply one decay pass to every message; returns how many were dropped.
    pub fn decay(&mut self) -> usize {
        decay(&mut self.messages)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// One decay pass over `messages`.
pub fn decay(messages: &mut Vec<Message>) -> usize {
    let before = messages.len();
    messages.retain_mut(|m| match m.lasting {
        0 => true,
        1 => false,
        _ => {
            m.lasting -= 1;
            true
        }
    });
    before - messages.len()
}
