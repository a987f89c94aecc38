//! Hierarchical cursors over a [`JsonDocument`].
//!
//! An item is a document reference plus a path prefix. It owns nothing and
//! is never persisted; build one whenever a subtree needs addressing.

use crate::entry::Entry;
use crate::flatten::build;
use crate::json_document::JsonDocument;
use crate::path::{self, Key, Path};
use crate::vector::{self, SearchHit};
use cairn_core::error::StoreError;
use serde_json::Value;

/// Read-only view of the subtree at `path`.
#[derive(Clone)]
pub struct Item<'a> {
    doc: &'a JsonDocument,
    path: Path,
}

impl<'a> Item<'a> {
    pub(crate) fn new(doc: &'a JsonDocument, path: Path) -> Self {
        Self { doc, path }
    }

    pub fn path(&self) -> &[Key] {
        &self.path
    }

    /// Entries whose path starts with this item's path.
    pub fn content(&self) -> Vec<&'a Entry> {
        let doc: &'a JsonDocument = self.doc;
        doc.data()
            .content
            .iter()
            .filter(|e| path::is_prefix(&self.path, &e.path))
            .collect()
    }

    /// Rebuild the nested value stored under this item.
    pub fn value(&self) -> Result<Value, StoreError> {
        let depth = self.path.len();
        build(self.content().into_iter().map(|e| {
            (
                e.path[depth..].to_vec(),
                e.value.clone().unwrap_or(Value::Null),
            )
        }))
    }

    /// Descend one key; fails with `KeyNotFound` if nothing lives there.
    pub fn get(&self, key: impl Into<Key>) -> Result<Item<'a>, StoreError> {
        let path = path::child(&self.path, key);
        self.doc.require(&path)?;
        Ok(Item::new(self.doc, path))
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        let path = path::child(&self.path, key);
        self.doc.data().content.contains_prefix(&path)
    }

    /// Rank this item's entries against `query`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let data = self.doc.data();
        let query = self
            .doc
            .embedder()
            .embed_one(query, data.embedding_precision, data.embedding_dimensions)
            .await?;
        Ok(vector::rank(
            self.content()
                .into_iter()
                .map(|e| (e.string.as_str(), e.embedding.as_slice())),
            &query,
            limit,
            threshold,
        ))
    }
}

/// Read-write view of the subtree at `path`.
pub struct ItemMut<'a> {
    doc: &'a mut JsonDocument,
    path: Path,
}

impl<'a> ItemMut<'a> {
    pub(crate) fn new(doc: &'a mut JsonDocument, path: Path) -> Self {
        Self { doc, path }
    }

    pub fn path(&self) -> &[Key] {
        &self.path
    }

    /// Reborrow as a read-only item.
    pub fn as_item(&self) -> Item<'_> {
        Item::new(self.doc, self.path.clone())
    }

    /// Descend one key; fails with `KeyNotFound` if nothing lives there.
    pub fn get(self, key: impl Into<Key>) -> Result<ItemMut<'a>, StoreError> {
        let path = path::child(&self.path, key);
        self.doc.require(&path)?;
        Ok(ItemMut::new(self.doc, path))
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.as_item().contains(key)
    }

    pub fn value(&self) -> Result<Value, StoreError> {
        self.as_item().value()
    }

    /// Write `value` at `path + [key]`, replacing anything there.
    pub async fn set(&mut self, key: impl Into<Key>, value: Value) -> Result<(), StoreError> {
        let path = path::child(&self.path, key);
        self.doc.set_value(&path, &value).await
    }

    /// Replace this item's own subtree.
    pub async fn assign(&mut self, value: Value) -> Result<(), StoreError> {
        let path = self.path.clone();
        self.doc.set_value(&path, &value).await
    }

    /// Remove everything under `path + [key]`.
    pub fn delete(&mut self, key: impl Into<Key>) -> Result<(), StoreError> {
        let path = path::child(&self.path, key);
        if self.doc.delete_value(&path) == 0 {
            return Err(StoreError::KeyNotFound {
                path: path::encode(&path),
            });
        }
        Ok(())
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        self.as_item().search(query, limit, threshold).await
    }
}
