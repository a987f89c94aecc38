//! Hierarchical document store with semantic retrieval.
//!
//! Nested values are flattened into path-addressed entries, each carrying a
//! display string and a unit-norm embedding. [`Item`] and [`ItemMut`] view
//! subtrees by path prefix; [`DocumentStore`] keeps named documents loaded
//! from, and saved to, a folder.

pub mod chunk;
pub mod document;
pub mod embedding;
pub mod entry;
pub mod extract;
pub mod flatten;
pub mod item;
pub mod json_document;
pub mod path;
pub mod store;
pub mod text_document;
pub mod vector;

pub use document::{Document, DocumentData, DocumentKind, DocumentSummary};
pub use embedding::{EmbeddingGateway, RetryPolicy, normalize};
pub use entry::{Entry, EntryTable};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use flatten::{build, flatten};
pub use item::{Item, ItemMut};
pub use json_document::JsonDocument;
pub use path::{Key, Path};
pub use store::{DocumentSource, DocumentStore, SearchResults};
pub use text_document::TextDocument;
pub use vector::SearchHit;
