//! Path codec.
//!
//! A [`Path`] addresses a leaf inside a nested value: each [`Key`] is either
//! a map key or a sequence index, and the empty path is the root. Paths are
//! stored as JSON arrays (`["users",0,"city"]`), which doubles as the entry
//! table key.

use cairn_core::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step in a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    pub fn is_index(&self) -> bool {
        matches!(self, Key::Index(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Ordered sequence of keys; empty = root.
pub type Path = Vec<Key>;

/// Whether `prefix` is a prefix of `path` (reflexive; the root prefixes everything).
pub fn is_prefix(prefix: &[Key], path: &[Key]) -> bool {
    path.len() >= prefix.len() && path[..prefix.len()] == *prefix
}

/// `prefix + [key]` as a new path.
pub fn child(prefix: &[Key], key: impl Into<Key>) -> Path {
    let mut path = prefix.to_vec();
    path.push(key.into());
    path
}

/// Serialized form used as the entry table key: `["users",0]`, root `[]`.
pub fn encode(path: &[Key]) -> String {
    // keys are plain strings and integers, which always serialize
    serde_json::to_string(path).unwrap_or_default()
}

/// Inverse of [`encode`].
pub fn decode(text: &str) -> Result<Path, StoreError> {
    serde_json::from_str(text).map_err(|e| StoreError::InvalidPath(format!("{text}: {e}")))
}

/// `[users][0][city]`, the bracketed form used in display strings.
pub fn bracketed(path: &[Key]) -> String {
    path.iter().map(|k| format!("[{k}]")).collect()
}

/// Parse the dotted command-line syntax: `users.0.city`.
///
/// Numeric components become sequence indices; an empty string is the root.
pub fn parse_dotted(text: &str) -> Result<Path, StoreError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split('.')
        .map(|part| {
            if part.is_empty() {
                return Err(StoreError::InvalidPath(format!("empty component in '{text}'")));
            }
            Ok(match part.parse::<usize>() {
                Ok(i) => Key::Index(i),
                Err(_) => Key::Name(part.to_string()),
            })
        })
        .collect()
}
