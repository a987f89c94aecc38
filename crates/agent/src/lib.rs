//! The conversational side of cairn.
//!
//! A [`Session`] keeps a [`MessageHistory`] of headers, decaying
//! observations and queued turns. Each turn the [`ContextAssembler`] renders
//! headers, auto-retrieves from the loaded documents, fits the most recent
//! turns into the token budget and decays the history; the completion is
//! streamed back through the [`MessageCollector`].

pub mod collector;
pub mod context;
pub mod history;
pub mod session;
pub mod template;

pub use collector::{CaptureScope, MessageCollector, Sender};
pub use context::{AssembledContext, AssemblyMetadata, ContextAssembler};
pub use history::{MessageHistory, STOP_MARKER};
pub use session::{DEFAULT_PREPROMPT, MEMORY_DESCRIPTION, Session};
pub use template::{TemplateVars, render};
