//! The document registry.
//!
//! Keeps loaded documents by title and mirrors a folder holding one
//! `<title>.json` file per document. Loading is lazy and idempotent; new
//! documents are written to disk as soon as they are built.

use crate::document::{Document, DocumentData, DocumentKind, DocumentSummary};
use crate::embedding::EmbeddingGateway;
use crate::extract::{PlainTextExtractor, TextExtractor};
use crate::json_document::JsonDocument;
use crate::text_document::TextDocument;
use crate::vector::SearchHit;
use cairn_config::{AppConfig, ClosePolicy};
use cairn_core::error::StoreError;
use cairn_core::provider::Provider;
use serde::Serialize;
use serde::ser::SerializeMap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a new document's content comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// An already parsed structure
    Value(Value),
    /// Raw text: JSON source for `json` documents, prose for `text` ones
    Text(String),
    /// A file: parsed as JSON, or run through the text extractor
    File(PathBuf),
}

/// Per-document ranked hits, in the order the documents were searched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub by_title: Vec<(String, Vec<SearchHit>)>,
}

impl SearchResults {
    pub fn get(&self, title: &str) -> Option<&[SearchHit]> {
        self.by_title
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, hits)| hits.as_slice())
    }

    pub fn total_hits(&self) -> usize {
        self.by_title.iter().map(|(_, hits)| hits.len()).sum()
    }

    /// True when no document produced a hit.
    pub fn is_empty(&self) -> bool {
        self.total_hits() == 0
    }
}

impl Serialize for SearchResults {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.by_title.len()))?;
        for (title, hits) in &self.by_title {
            map.serialize_entry(title, hits)?;
        }
        map.end()
    }
}

/// Named collection of loaded documents backed by a folder.
pub struct DocumentStore {
    folder: PathBuf,
    embedder: Arc<EmbeddingGateway>,
    precision: u32,
    dimensions: usize,
    chunk_tokens: usize,
    close_policy: ClosePolicy,
    documents: Vec<Document>,
    extractor: Box<dyn TextExtractor>,
}

impl DocumentStore {
    /// Open a store over `folder`, creating it if needed.
    pub fn new(folder: impl Into<PathBuf>, embedder: Arc<EmbeddingGateway>) -> Result<Self, StoreError> {
        let folder = folder.into();
        std::fs::create_dir_all(&folder).map_err(|e| io_error(&folder, e))?;
        let defaults = cairn_config::EmbeddingConfig::default();
        let store_defaults = cairn_config::StoreConfig::default();
        Ok(Self {
            folder,
            embedder,
            precision: defaults.precision,
            dimensions: defaults.dimensions,
            chunk_tokens: store_defaults.chunk_tokens,
            close_policy: store_defaults.close_policy,
            documents: Vec::new(),
            extractor: Box::new(PlainTextExtractor),
        })
    }

    /// Open the store described by `config`, embedding through `provider`.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Result<Self, StoreError> {
        let embedder = Arc::new(EmbeddingGateway::from_config(provider, &config.embedding));
        let store = Self::new(config.store_dir(), embedder)?
            .with_defaults(config.embedding.precision, config.embedding.dimensions)
            .with_chunk_tokens(config.store.chunk_tokens)
            .with_close_policy(config.store.close_policy);
        info!(folder = %store.folder.display(), "Document store opened");
        Ok(store)
    }

    pub fn with_defaults(mut self, precision: u32, dimensions: usize) -> Self {
        self.precision = precision;
        self.dimensions = dimensions;
        self
    }

    pub fn with_chunk_tokens(mut self, chunk_tokens: usize) -> Self {
        self.chunk_tokens = chunk_tokens.max(1);
        self
    }

    pub fn with_close_policy(mut self, policy: ClosePolicy) -> Self {
        self.close_policy = policy;
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn embedder(&self) -> &Arc<EmbeddingGateway> {
        &self.embedder
    }

    /// Build, persist and register a document.
    ///
    /// `precision` and `dimensions` fall back to the store defaults. A loaded
    /// document with the same title is replaced.
    pub async fn new_document(
        &mut self,
        kind: DocumentKind,
        title: &str,
        source: DocumentSource,
        description: &str,
        precision: Option<u32>,
        dimensions: Option<usize>,
    ) -> Result<&Document, StoreError> {
        check_title(title)?;
        let precision = precision.unwrap_or(self.precision);
        let dimensions = dimensions.unwrap_or(self.dimensions);
        let embedder = Arc::clone(&self.embedder);

        let document = match kind {
            DocumentKind::Json => {
                let value = self.json_source(source)?;
                Document::Json(
                    JsonDocument::load_data(embedder, title, &value, description, precision, dimensions)
                        .await?,
                )
            }
            DocumentKind::Text => {
                let text = self.text_source(source)?;
                Document::Text(
                    TextDocument::load_data(
                        embedder,
                        title,
                        &text,
                        description,
                        precision,
                        dimensions,
                        self.chunk_tokens,
                    )
                    .await?,
                )
            }
        };

        let file = self.write(document.data())?;
        info!(title, kind = %kind, path = %file.display(), "Document created");

        let index = match self.position(title) {
            Some(i) => {
                self.documents[i] = document;
                i
            }
            None => {
                self.documents.push(document);
                self.documents.len() - 1
            }
        };
        Ok(&self.documents[index])
    }

    /// Read `<title>.json` and register it. No-op if already loaded.
    ///
    /// A missing file is `DocumentNotFound`; an unreadable or malformed one
    /// is `MalformedDocument`. Either way loaded documents are untouched.
    pub fn load_document(&mut self, title: &str) -> Result<(), StoreError> {
        if self.position(title).is_some() {
            return Ok(());
        }
        check_title(title)?;

        let file = self.file_for(title);
        if !file.is_file() {
            return Err(StoreError::DocumentNotFound(title.to_string()));
        }

        let text = std::fs::read_to_string(&file).map_err(|e| io_error(&file, e))?;
        let data: DocumentData =
            serde_json::from_str(&text).map_err(|e| malformed(&file, e.to_string()))?;
        data.check().map_err(|reason| malformed(&file, reason))?;

        let mut document = Document::from_data(data, Arc::clone(&self.embedder));
        if document.title() != title {
            debug!(stored = %document.title(), title, "Stored title differs from file name");
            document.rename(title);
        }
        info!(title, kind = %document.kind(), entries = document.data().content.len(), "Document loaded");
        self.documents.push(document);
        Ok(())
    }

    /// Load `title`, first creating it as an empty JSON document when no
    /// file exists for it.
    pub async fn ensure_json_document(&mut self, title: &str, description: &str) -> Result<(), StoreError> {
        if !self.is_loaded(title) && !self.file_for(title).is_file() {
            self.new_document(
                DocumentKind::Json,
                title,
                DocumentSource::Value(Value::Object(Default::default())),
                description,
                None,
                None,
            )
            .await?;
        }
        self.load_document(title)
    }

    /// Evict a loaded document, honoring the close policy for unsaved edits.
    ///
    /// Returns whether anything was closed.
    pub fn close_document(&mut self, title: &str) -> Result<bool, StoreError> {
        let Some(index) = self.position(title) else {
            return Ok(false);
        };

        if self.documents[index].is_dirty() {
            match self.close_policy {
                ClosePolicy::Save => {
                    self.save_document(title)?;
                }
                ClosePolicy::Warn => {
                    warn!(title, "Closing document with unsaved edits; changes discarded");
                }
                ClosePolicy::Discard => {
                    debug!(title, "Discarding unsaved edits on close");
                }
            }
        }

        self.documents.remove(index);
        info!(title, "Document closed");
        Ok(true)
    }

    /// Persist a loaded document, returning the file written.
    pub fn save_document(&mut self, title: &str) -> Result<PathBuf, StoreError> {
        let index = self
            .position(title)
            .ok_or_else(|| StoreError::DocumentNotLoaded(title.to_string()))?;
        let file = self.write(self.documents[index].data())?;
        self.documents[index].mark_saved();
        info!(title, path = %file.display(), "Document saved");
        Ok(file)
    }

    /// Search the named documents, or every loaded one.
    ///
    /// Each document is capped at `limit` independently; hits are not merged
    /// across documents. The query is embedded once per distinct
    /// (precision, dimensions) pair.
    pub async fn search(
        &self,
        query: &str,
        titles: Option<&[String]>,
        limit: usize,
        threshold: f32,
    ) -> Result<SearchResults, StoreError> {
        let targets: Vec<&Document> = match titles {
            Some(titles) => titles
                .iter()
                .map(|t| {
                    self.get_document(t)
                        .ok_or_else(|| StoreError::DocumentNotLoaded(t.clone()))
                })
                .collect::<Result<_, _>>()?,
            None => self.documents.iter().collect(),
        };

        let mut queries: HashMap<(u32, usize), Vec<f32>> = HashMap::new();
        let mut results = SearchResults::default();
        for doc in targets {
            let data = doc.data();
            let shape = (data.embedding_precision, data.embedding_dimensions);
            if !queries.contains_key(&shape) {
                let vector = self.embedder.embed_one(query, shape.0, shape.1).await?;
                queries.insert(shape, vector);
            }
            let hits = data.rank(&queries[&shape], limit, threshold);
            debug!(title = %data.title, hits = hits.len(), "Searched document");
            results.by_title.push((data.title.clone(), hits));
        }
        Ok(results)
    }

    pub fn get_document(&self, title: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.title() == title)
    }

    pub fn get_document_mut(&mut self, title: &str) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.title() == title)
    }

    /// The loaded JSON document `title`, mutably.
    pub fn json_document_mut(&mut self, title: &str) -> Result<&mut JsonDocument, StoreError> {
        match self.get_document_mut(title) {
            Some(doc) => doc.as_json_mut().ok_or_else(|| {
                StoreError::InvalidContent(format!("'{title}' is a text document"))
            }),
            None => Err(StoreError::DocumentNotLoaded(title.to_string())),
        }
    }

    /// Titles of every persisted document, sorted.
    pub fn get_titles(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.folder).map_err(|e| io_error(&self.folder, e))?;
        let mut titles: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        titles.sort();
        Ok(titles)
    }

    /// `{title, description}` of each loaded document, in load order.
    pub fn get_loaded(&self) -> Vec<DocumentSummary> {
        self.documents.iter().map(Document::summary).collect()
    }

    pub fn is_loaded(&self, title: &str) -> bool {
        self.position(title).is_some()
    }

    pub fn loaded_count(&self) -> usize {
        self.documents.len()
    }

    fn position(&self, title: &str) -> Option<usize> {
        self.documents.iter().position(|d| d.title() == title)
    }

    fn file_for(&self, title: &str) -> PathBuf {
        self.folder.join(format!("{title}.json"))
    }

    fn write(&self, data: &DocumentData) -> Result<PathBuf, StoreError> {
        let file = self.file_for(&data.title);
        let text = serde_json::to_string(data).map_err(|e| StoreError::Io {
            path: file.display().to_string(),
            reason: format!("serialization failed: {e}"),
        })?;
        let tmp = file.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| io_error(&tmp, e))?;
        std::fs::rename(&tmp, &file).map_err(|e| io_error(&file, e))?;
        Ok(file)
    }

    fn json_source(&self, source: DocumentSource) -> Result<Value, StoreError> {
        match source {
            DocumentSource::Value(value) => Ok(value),
            DocumentSource::Text(text) => serde_json::from_str(&text)
                .map_err(|e| StoreError::InvalidContent(format!("invalid JSON: {e}"))),
            DocumentSource::File(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
                serde_json::from_str(&text).map_err(|e| {
                    StoreError::InvalidContent(format!("invalid JSON in {}: {e}", path.display()))
                })
            }
        }
    }

    fn text_source(&self, source: DocumentSource) -> Result<String, StoreError> {
        match source {
            DocumentSource::Value(Value::String(text)) | DocumentSource::Text(text) => Ok(text),
            DocumentSource::Value(value) => serde_json::to_string_pretty(&value)
                .map_err(|e| StoreError::InvalidContent(e.to_string())),
            DocumentSource::File(path) => self.extractor.extract(&path),
        }
    }
}

fn check_title(title: &str) -> Result<(), StoreError> {
    let bad = title.trim().is_empty()
        || title.starts_with('.')
        || title.contains(['/', '\\'])
        || title.contains('\0');
    if bad {
        return Err(StoreError::InvalidContent(format!(
            "'{title}' is not a usable document title"
        )));
    }
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn malformed(path: &Path, reason: String) -> StoreError {
    StoreError::MalformedDocument {
        path: path.display().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::RetryPolicy;
    use cairn_providers::HashingProvider;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> DocumentStore {
        let gateway = Arc::new(EmbeddingGateway::new(
            Arc::new(HashingProvider::new()),
            "hash",
            RetryPolicy::default(),
        ));
        DocumentStore::new(dir.path(), gateway)
            .unwrap()
            .with_defaults(5, 64)
            .with_chunk_tokens(12)
    }

    fn people() -> Value {
        json!({
            "users": {
                "Ana": {"age": 38, "job": "Programmer", "city": "Vibeuf"},
                "Manon": {"age": 35, "job": "Nurse", "city": "Guignen"}
            }
        })
    }

    async fn with_people(store: &mut DocumentStore) {
        store
            .new_document(
                DocumentKind::Json,
                "people",
                DocumentSource::Value(people()),
                "Who lives where",
                None,
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ensure_json_document_creates_then_reuses() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.ensure_json_document("memory", "Agent memory").await.unwrap();
        assert!(store.is_loaded("memory"));
        assert!(dir.path().join("memory.json").is_file());

        store.json_document_mut("memory").unwrap().set("pet", json!("cat")).await.unwrap();
        store.save_document("memory").unwrap();

        let mut reopened = self::store(&dir);
        reopened.ensure_json_document("memory", "Agent memory").await.unwrap();
        let Some(Document::Json(doc)) = reopened.get_document("memory") else {
            panic!("memory should be a loaded JSON document");
        };
        assert_eq!(doc.value().unwrap(), json!({"pet": "cat"}));
    }

    #[tokio::test]
    async fn new_document_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        with_people(&mut store).await;
        assert!(dir.path().join("people.json").is_file());
        assert_eq!(store.get_titles().unwrap(), vec!["people"]);
        assert_eq!(
            store.get_loaded(),
            vec![DocumentSummary {
                title: "people".into(),
                description: "Who lives where".into()
            }]
        );
    }

    #[tokio::test]
    async fn save_close_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        with_people(&mut store).await;

        let doc = store.json_document_mut("people").unwrap();
        doc.root_mut()
            .get("users")
            .unwrap()
            .set("Aurelien", json!({"age": 37, "job": "Cook", "city": "Rouen"}))
            .await
            .unwrap();
        store.save_document("people").unwrap();
        assert!(store.close_document("people").unwrap());
        assert!(!store.is_loaded("people"));

        store.load_document("people").unwrap();
        let doc = store.get_document("people").unwrap();
        assert_eq!(doc.kind(), DocumentKind::Json);
        assert!(!doc.is_dirty());
        let value = doc.as_json().unwrap().value().unwrap();
        assert_eq!(value["users"]["Aurelien"]["city"], json!("Rouen"));
        let names: Vec<_> = value["users"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["Ana", "Manon", "Aurelien"]);
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        with_people(&mut store).await;
        store.load_document("people").unwrap();
        store.load_document("people").unwrap();
        assert_eq!(store.loaded_count(), 1);
    }

    #[tokio::test]
    async fn load_missing_document() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        assert!(matches!(
            store.load_document("ghost"),
            Err(StoreError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn malformed_file_leaves_loaded_documents_alone() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        with_people(&mut store).await;
        std::fs::write(dir.path().join("broken.json"), r#"{"title":"broken","kind":"pdf"}"#).unwrap();
        std::fs::write(dir.path().join("garbage.json"), "not json").unwrap();

        assert!(matches!(
            store.load_document("broken"),
            Err(StoreError::MalformedDocument { .. })
        ));
        assert!(matches!(
            store.load_document("garbage"),
            Err(StoreError::MalformedDocument { .. })
        ));
        assert_eq!(store.loaded_count(), 1);
        assert!(store.get_document("people").is_some());
    }

    #[tokio::test]
    async fn close_policy_save_persists_edits() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir).with_close_policy(ClosePolicy::Save);
        with_people(&mut store).await;
        store
            .json_document_mut("people")
            .unwrap()
            .set("note", json!("remember"))
            .await
            .unwrap();
        store.close_document("people").unwrap();

        store.load_document("people").unwrap();
        let doc = store.get_document("people").unwrap().as_json().unwrap();
        assert_eq!(doc.value().unwrap()["note"], json!("remember"));
    }

    #[tokio::test]
    async fn close_policy_warn_discards_edits() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir).with_close_policy(ClosePolicy::Warn);
        with_people(&mut store).await;
        store
            .json_document_mut("people")
            .unwrap()
            .set("note", json!("forgotten"))
            .await
            .unwrap();
        store.close_document("people").unwrap();
        assert!(!store.close_document("people").unwrap());

        store.load_document("people").unwrap();
        let doc = store.get_document("people").unwrap().as_json().unwrap();
        assert!(!doc.contains("note"));
    }

    #[tokio::test]
    async fn save_requires_loaded_document() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        assert!(matches!(
            store.save_document("ghost"),
            Err(StoreError::DocumentNotLoaded(_))
        ));
    }

    #[tokio::test]
    async fn text_documents_from_files() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("bio.txt");
        std::fs::write(
            &source,
            "Devin Townsend is a Canadian musician. He was born in New Westminster.",
        )
        .unwrap();
        let mut store = store(&dir);
        let doc = store
            .new_document(
                DocumentKind::Text,
                "bio",
                DocumentSource::File(source),
                "Biography",
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(doc.as_text().unwrap().chunks().count(), 2);

        store.close_document("bio").unwrap();
        store.load_document("bio").unwrap();
        let doc = store.get_document("bio").unwrap();
        assert_eq!(doc.kind(), DocumentKind::Text);
        assert_eq!(doc.as_text().unwrap().chunks().count(), 2);
    }

    #[tokio::test]
    async fn search_fans_out_per_document() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        with_people(&mut store).await;
        store
            .new_document(
                DocumentKind::Text,
                "bio",
                DocumentSource::Text("Manon works as a nurse in Guignen.".into()),
                "Notes",
                None,
                Some(32),
            )
            .await
            .unwrap();

        let results = store.search("Manon nurse", None, 2, 0.1).await.unwrap();
        let titles: Vec<_> = results.by_title.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(titles, vec!["people", "bio"]);
        let people_hits = results.get("people").unwrap();
        assert!(people_hits.len() <= 2);
        assert!(people_hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(people_hits[0].text.contains("Manon"));
        assert_eq!(results.get("bio").unwrap().len(), 1);

        let json = serde_json::to_value(&results).unwrap();
        assert!(json["people"][0]["score"].is_number());
    }

    #[tokio::test]
    async fn search_named_documents_must_be_loaded() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        with_people(&mut store).await;
        let titles = vec!["ghost".to_string()];
        assert!(matches!(
            store.search("x", Some(&titles), 5, 0.0).await,
            Err(StoreError::DocumentNotLoaded(_))
        ));
        let titles = vec!["people".to_string()];
        let results = store.search("Nurse", Some(&titles), 5, 0.0).await.unwrap();
        assert_eq!(results.by_title.len(), 1);
    }

    #[tokio::test]
    async fn invalid_titles_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        for title in ["", "../escape", ".hidden"] {
            let result = store
                .new_document(
                    DocumentKind::Json,
                    title,
                    DocumentSource::Value(json!({"a": 1})),
                    "",
                    None,
                    None,
                )
                .await;
            assert!(matches!(result, Err(StoreError::InvalidContent(_))));
        }
    }

    #[tokio::test]
    async fn json_source_from_text() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        let doc = store
            .new_document(
                DocumentKind::Json,
                "cfg",
                DocumentSource::Text(r#"{"a": [1, 2]}"#.into()),
                "",
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(doc.as_json().unwrap().value().unwrap(), json!({"a": [1, 2]}));

        let bad = store
            .new_document(DocumentKind::Json, "bad", DocumentSource::Text("{".into()), "", None, None)
            .await;
        assert!(matches!(bad, Err(StoreError::InvalidContent(_))));
    }
}
