//! Fragment collection and scoped capture.
//!
//! Streamed tokens and captured output arrive in small fragments.
//! [`MessageCollector`] merges consecutive fragments from the same sender
//! into one message and hands it to the history once the sender changes or
//! [`flush`](MessageCollector::flush) is called.
//!
//! [`CaptureScope`] switches the current sender for as long as it lives,
//! restoring the previous one on drop. Scopes nest by reborrowing.

use crate::history::MessageHistory;
use cairn_core::message::{Message, MessageKind, Role};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Who captured output is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub role: Role,
    pub name: String,
}

impl Sender {
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
        }
    }
}

/// Merges fragments into messages and feeds the history.
#[derive(Debug)]
pub struct MessageCollector {
    history: MessageHistory,
    pending: Option<Message>,
    sender: Sender,
}

impl MessageCollector {
    pub fn new(history: MessageHistory, sender: Sender) -> Self {
        Self {
            history,
            pending: None,
            sender,
        }
    }

    /// Add a fragment.
    ///
    /// User fragments get a trailing newline. A fragment from a new sender
    /// name flushes the pending message first.
    pub fn collect(&mut self, mut fragment: Message) {
        if fragment.role == Role::User {
            fragment.content.push('\n');
        }
        match self.pending.as_mut() {
            Some(pending) if pending.name == fragment.name => {
                pending.content.push_str(&fragment.content);
            }
            Some(_) => {
                self.flush();
                self.pending = Some(fragment);
            }
            None => self.pending = Some(fragment),
        }
    }

    /// Collect `text` as a queued fragment from the current sender.
    pub fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let Sender { role, name } = self.sender.clone();
        self.collect(Message::new(role, name, text, MessageKind::Queued, 0));
    }

    /// Hand the pending message, if any, to the history.
    pub fn flush(&mut self) {
        if let Some(message) = self.pending.take() {
            self.history.add(message);
        }
    }

    /// Attribute output to `role`/`name` until the returned scope drops.
    pub fn capture(&mut self, role: Role, name: impl Into<String>) -> CaptureScope<'_> {
        let saved = std::mem::replace(&mut self.sender, Sender::new(role, name));
        CaptureScope {
            collector: self,
            saved: Some(saved),
        }
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn pending(&self) -> Option<&Message> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut MessageHistory {
        &mut self.history
    }
}

/// RAII guard returned by [`MessageCollector::capture`].
pub struct CaptureScope<'a> {
    collector: &'a mut MessageCollector,
    saved: Option<Sender>,
}

impl Deref for CaptureScope<'_> {
    type Target = MessageCollector;

    fn deref(&self) -> &MessageCollector {
        self.collector
    }
}

impl DerefMut for CaptureScope<'_> {
    fn deref_mut(&mut self) -> &mut MessageCollector {
        self.collector
    }
}

impl fmt::Write for CaptureScope<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.collector.write(s);
        Ok(())
    }
}

impl Drop for CaptureScope<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.collector.sender = saved;
        }
    }
}
