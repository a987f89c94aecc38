//! Document metadata, persisted form, and the kind-dispatching wrapper.

use crate::embedding::EmbeddingGateway;
use crate::entry::EntryTable;
use crate::json_document::JsonDocument;
use crate::text_document::TextDocument;
use crate::vector::{self, SearchHit};
use cairn_core::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which variant a persisted document restores into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Json,
    Text,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Json => f.write_str("json"),
            DocumentKind::Text => f.write_str("text"),
        }
    }
}

impl FromStr for DocumentKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(DocumentKind::Json),
            "text" => Ok(DocumentKind::Text),
            other => Err(StoreError::InvalidContent(format!(
                "unknown document kind '{other}' (expected json or text)"
            ))),
        }
    }
}

/// Everything a document persists: metadata plus its entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    pub title: String,

    #[serde(alias = "type")]
    pub kind: DocumentKind,

    #[serde(default)]
    pub description: String,

    #[serde(alias = "precision")]
    pub embedding_precision: u32,

    #[serde(alias = "dimensions")]
    pub embedding_dimensions: usize,

    #[serde(default)]
    pub content: EntryTable,
}

impl DocumentData {
    pub fn new(
        title: impl Into<String>,
        kind: DocumentKind,
        description: impl Into<String>,
        precision: u32,
        dimensions: usize,
    ) -> Self {
        Self {
            title: title.into(),
            kind,
            description: description.into(),
            embedding_precision: precision,
            embedding_dimensions: dimensions,
            content: EntryTable::new(),
        }
    }

    /// Check that every stored embedding has the declared dimensionality.
    pub fn check(&self) -> Result<(), String> {
        if self.embedding_dimensions == 0 {
            return Err("embeddingDimensions must be > 0".into());
        }
        match self
            .content
            .iter()
            .find(|e| e.embedding.len() != self.embedding_dimensions)
        {
            Some(e) => Err(format!(
                "entry {} has {} dimensions, expected {}",
                e.key(),
                e.embedding.len(),
                self.embedding_dimensions
            )),
            None => Ok(()),
        }
    }

    /// Rank all entries against an already embedded query.
    pub fn rank(&self, query: &[f32], limit: usize, threshold: f32) -> Vec<SearchHit> {
        vector::rank(
            self.content
                .iter()
                .map(|e| (e.string.as_str(), e.embedding.as_slice())),
            query,
            limit,
            threshold,
        )
    }
}

/// `{title, description}` summary of a loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub title: String,
    pub description: String,
}

/// A loaded document of either kind.
pub enum Document {
    Json(JsonDocument),
    Text(TextDocument),
}

impl Document {
    /// Restore a document from its persisted data.
    pub fn from_data(data: DocumentData, embedder: Arc<EmbeddingGateway>) -> Self {
        match data.kind {
            DocumentKind::Json => Document::Json(JsonDocument::from_data(data, embedder)),
            DocumentKind::Text => Document::Text(TextDocument::from_data(data, embedder)),
        }
    }

    pub fn data(&self) -> &DocumentData {
        match self {
            Document::Json(doc) => doc.data(),
            Document::Text(doc) => doc.data(),
        }
    }

    pub fn title(&self) -> &str {
        &self.data().title
    }

    pub fn kind(&self) -> DocumentKind {
        self.data().kind
    }

    pub fn description(&self) -> &str {
        &self.data().description
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            title: self.title().to_string(),
            description: self.description().to_string(),
        }
    }

    /// Whether there are edits not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        match self {
            Document::Json(doc) => doc.is_dirty(),
            Document::Text(_) => false,
        }
    }

    pub(crate) fn mark_saved(&mut self) {
        if let Document::Json(doc) = self {
            doc.mark_saved();
        }
    }

    pub(crate) fn rename(&mut self, title: &str) {
        match self {
            Document::Json(doc) => doc.data_mut().title = title.to_string(),
            Document::Text(doc) => doc.data_mut().title = title.to_string(),
        }
    }

    /// Semantic search over the whole document.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        match self {
            Document::Json(doc) => doc.search(query, limit, threshold).await,
            Document::Text(doc) => doc.search(query, limit, threshold).await,
        }
    }

    pub fn as_json(&self) -> Option<&JsonDocument> {
        match self {
            Document::Json(doc) => Some(doc),
            Document::Text(_) => None,
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut JsonDocument> {
        match self {
            Document::Json(doc) => Some(doc),
            Document::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextDocument> {
        match self {
            Document::Text(doc) => Some(doc),
            Document::Json(_) => None,
        }
    }
}
