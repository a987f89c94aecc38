//! Path-addressed documents over arbitrary nested JSON.

use crate::document::{DocumentData, DocumentKind};
use crate::embedding::EmbeddingGateway;
use crate::entry::Entry;
use crate::flatten::flatten;
use crate::item::{Item, ItemMut};
use crate::path::{self, Key, Path};
use crate::vector::SearchHit;
use cairn_core::error::StoreError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A document whose entries are the leaves of one nested value.
///
/// The document is also the root [`Item`] over itself: `get`, `set`,
/// `delete`, `contains`, `value` and `search` here act on the empty path.
pub struct JsonDocument {
    data: DocumentData,
    embedder: Arc<EmbeddingGateway>,
    dirty: bool,
}

impl JsonDocument {
    /// Flatten `content`, embed every leaf, and build a new document.
    pub async fn load_data(
        embedder: Arc<EmbeddingGateway>,
        title: impl Into<String>,
        content: &Value,
        description: impl Into<String>,
        precision: u32,
        dimensions: usize,
    ) -> Result<Self, StoreError> {
        let data = DocumentData::new(title, DocumentKind::Json, description, precision, dimensions);
        let mut doc = Self::from_data(data, embedder);
        let entries = doc.derive_entries(&[], content).await?;
        for entry in entries {
            doc.data.content.insert(entry);
        }
        debug!(title = %doc.data.title, entries = doc.data.content.len(), "JSON document built");
        Ok(doc)
    }

    pub(crate) fn from_data(data: DocumentData, embedder: Arc<EmbeddingGateway>) -> Self {
        Self {
            data,
            embedder,
            dirty: false,
        }
    }

    pub fn data(&self) -> &DocumentData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut DocumentData {
        &mut self.data
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Read-only view at the root.
    pub fn root(&self) -> Item<'_> {
        Item::new(self, Vec::new())
    }

    /// Read-write view at the root.
    pub fn root_mut(&mut self) -> ItemMut<'_> {
        ItemMut::new(self, Vec::new())
    }

    /// Read-only view at `path`; fails unless some entry lives under it.
    pub fn item(&self, path: &[Key]) -> Result<Item<'_>, StoreError> {
        self.require(path)?;
        Ok(Item::new(self, path.to_vec()))
    }

    /// Read-write view at `path`; fails unless some entry lives under it.
    pub fn item_mut(&mut self, path: &[Key]) -> Result<ItemMut<'_>, StoreError> {
        self.require(path)?;
        Ok(ItemMut::new(self, path.to_vec()))
    }

    pub fn get(&self, key: impl Into<Key>) -> Result<Item<'_>, StoreError> {
        self.root().get(key)
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.root().contains(key)
    }

    pub fn value(&self) -> Result<Value, StoreError> {
        self.root().value()
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        self.root().search(query, limit, threshold).await
    }

    pub async fn set(&mut self, key: impl Into<Key>, value: Value) -> Result<(), StoreError> {
        self.root_mut().set(key, value).await
    }

    pub async fn assign(&mut self, value: Value) -> Result<(), StoreError> {
        self.root_mut().assign(value).await
    }

    pub fn delete(&mut self, key: impl Into<Key>) -> Result<(), StoreError> {
        self.root_mut().delete(key)
    }

    pub(crate) fn embedder(&self) -> &EmbeddingGateway {
        &self.embedder
    }

    pub(crate) fn require(&self, path: &[Key]) -> Result<(), StoreError> {
        if path.is_empty() || self.data.content.contains_prefix(path) {
            Ok(())
        } else {
            Err(StoreError::KeyNotFound {
                path: path::encode(path),
            })
        }
    }

    /// Replace whatever lives at `path` with `value`.
    ///
    /// Entries under `path` go, and so do leaves at any strict ancestor of
    /// `path`, since a scalar or empty marker there would contradict the new
    /// children. Embedding happens first so a provider failure leaves the
    /// document untouched.
    pub(crate) async fn set_value(&mut self, path: &[Key], value: &Value) -> Result<(), StoreError> {
        self.check_shape(path)?;
        let entries = self.derive_entries(path, value).await?;

        // a leaf overwritten by a leaf keeps its position
        let in_place = matches!(entries.as_slice(), [entry] if entry.path == path)
            && self.data.content.get(path).is_some()
            && self.data.content.under(path).all(|e| e.path.len() == path.len());

        let mut removed = self
            .data
            .content
            .remove_where(|e| e.path.len() < path.len() && path::is_prefix(&e.path, path));
        if !in_place {
            removed += self.remove_at(path);
        }
        for entry in entries {
            self.data.content.insert(entry);
        }
        self.dirty = true;
        debug!(title = %self.data.title, path = %path::encode(path), removed, "Value set");
        Ok(())
    }

    /// Remove every entry under `path`; returns how many went.
    pub(crate) fn delete_value(&mut self, path: &[Key]) -> usize {
        let removed = self.remove_at(path);
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    fn remove_at(&mut self, path: &[Key]) -> usize {
        self.data.content.remove_where(|e| path::is_prefix(path, &e.path))
    }

    /// A map key cannot be written into a sequence, nor an index into a map.
    ///
    /// Both sibling keys and an empty-container marker at the parent count
    /// as evidence of the parent's kind.
    fn check_shape(&self, path: &[Key]) -> Result<(), StoreError> {
        for (depth, key) in path.iter().enumerate() {
            let parent = &path[..depth];
            let marker_clash = self.data.content.get(parent).is_some_and(|e| {
                match e.value.as_ref() {
                    Some(Value::Array(items)) if items.is_empty() => !key.is_index(),
                    Some(Value::Object(map)) if map.is_empty() => key.is_index(),
                    _ => false,
                }
            });
            let clash = marker_clash
                || self.data.content.under(parent).any(|e| {
                    e.path
                        .get(depth)
                        .is_some_and(|existing| existing.is_index() != key.is_index())
                });
            if clash {
                return Err(StoreError::ShapeConflict {
                    path: path::encode(path),
                });
            }
        }
        Ok(())
    }

    async fn derive_entries(&self, prefix: &[Key], value: &Value) -> Result<Vec<Entry>, StoreError> {
        let mut leaves = flatten(value);
        if leaves.is_empty() {
            // null flattens to nothing; below the root it is still a leaf
            if prefix.is_empty() {
                return Ok(Vec::new());
            }
            leaves.push((Vec::new(), Value::Null));
        }

        let leaves: Vec<(Path, Value)> = leaves
            .into_iter()
            .map(|(rel, v)| {
                let mut full = prefix.to_vec();
                full.extend(rel);
                (full, v)
            })
            .collect();
        let strings: Vec<String> = leaves
            .iter()
            .map(|(p, v)| display_string(&self.data.title, p, v))
            .collect();

        let embeddings = self
            .embedder
            .embed(&strings, self.data.embedding_precision, self.data.embedding_dimensions)
            .await?;

        Ok(leaves
            .into_iter()
            .zip(strings)
            .zip(embeddings)
            .map(|(((path, value), string), embedding)| Entry {
                path,
                value: Some(value),
                string,
                embedding,
            })
            .collect())
    }
}

/// `title[users][0][city]="Rouen"`.
pub fn display_string(title: &str, path: &[Key], value: &Value) -> String {
    let rendered = match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Value not serializable, using debug form");
            format!("{value:?}")
        }
    };
    format!("{title}{}={rendered}", path::bracketed(path))
}
