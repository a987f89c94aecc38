//! # Cairn Core
//!
//! Domain types, traits, and error definitions shared by every cairn crate.
//! This crate has **no framework dependencies**: it defines the message
//! model, the provider capability boundary (completion + embeddings), and
//! the capability registry that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! External collaborators (LLM completion, embedding providers, tools) are
//! traits here. Implementations live in their respective crates, so tests
//! can substitute deterministic mocks and the dependency graph points
//! inward on core.

pub mod error;
pub mod message;
pub mod provider;
pub mod token;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageKind, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use tool::{Tool, ToolCall, ToolResult, ToolRegistry};
