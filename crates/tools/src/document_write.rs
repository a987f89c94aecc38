//! Edit JSON documents: write or delete the value at a path.
//!
//! Edits are saved immediately unless `save` is false.

use crate::{SharedStore, path_arg, str_arg};
use async_trait::async_trait;
use cairn_core::error::{StoreError, ToolError};
use cairn_core::tool::{Tool, ToolResult};
use cairn_store::{DocumentStore, Key};
use serde_json::{Value, json};
use tracing::debug;

pub struct DocumentWriteTool {
    store: SharedStore,
}

impl DocumentWriteTool {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DocumentWriteTool {
    fn name(&self) -> &str {
        "document_write"
    }

    fn description(&self) -> &str {
        "Write a JSON value into a JSON document at a path, replacing whatever was there. \
         An empty or missing path replaces the whole document."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Document title" },
                "path": { "description": "Where to write, dotted string or array of keys" },
                "value": { "description": "Any JSON value" },
                "save": { "type": "boolean", "description": "Persist right away (default true)", "default": true }
            },
            "required": ["title", "value"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let title = str_arg(&arguments, "title")?;
        let path = path_arg(&arguments, "path")?;
        let value = arguments
            .get("value")
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'value' argument".into()))?;
        let save = arguments["save"].as_bool().unwrap_or(true);

        let mut store = self.store.lock().await;
        Ok(match write(&mut store, title, &path, value, save).await {
            Ok(()) => ToolResult::ok(format!("Wrote {title}{}", cairn_store::path::bracketed(&path)), None),
            Err(e) => ToolResult::failed(format!("Writing to '{title}' failed: {e}")),
        })
    }
}

async fn write(
    store: &mut DocumentStore,
    title: &str,
    path: &[Key],
    value: Value,
    save: bool,
) -> Result<(), StoreError> {
    store.load_document(title)?;
    let doc = store.json_document_mut(title)?;
    match path.split_last() {
        None => doc.assign(value).await?,
        Some((last, parent)) => doc.item_mut(parent)?.set(last.clone(), value).await?,
    }
    debug!(title, path = %cairn_store::path::encode(path), save, "Value written");
    if save {
        store.save_document(title)?;
    }
    Ok(())
}

pub struct DocumentDeleteTool {
    store: SharedStore,
}

impl DocumentDeleteTool {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DocumentDeleteTool {
    fn name(&self) -> &str {
        "document_delete"
    }

    fn description(&self) -> &str {
        "Delete the value at a path in a JSON document, along with everything below it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Document title" },
                "path": { "description": "What to delete, dotted string or array of keys" },
                "save": { "type": "boolean", "description": "Persist right away (default true)", "default": true }
            },
            "required": ["title", "path"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let title = str_arg(&arguments, "title")?;
        let path = path_arg(&arguments, "path")?;
        let Some((last, parent)) = path.split_last() else {
            return Err(ToolError::InvalidArguments(
                "'path' must name something inside the document".into(),
            ));
        };
        let save = arguments["save"].as_bool().unwrap_or(true);

        let mut store = self.store.lock().await;
        let result = delete(&mut store, title, parent, last.clone(), save).await;
        Ok(match result {
            Ok(()) => ToolResult::ok(format!("Deleted {title}{}", cairn_store::path::bracketed(&path)), None),
            Err(e) => ToolResult::failed(format!("Deleting from '{title}' failed: {e}")),
        })
    }
}

async fn delete(
    store: &mut DocumentStore,
    title: &str,
    parent: &[Key],
    key: Key,
    save: bool,
) -> Result<(), StoreError> {
    store.load_document(title)?;
    debug!(title, parent = %cairn_store::path::encode(parent), key = %key, "Deleting value");
    store.json_document_mut(title)?.item_mut(parent)?.delete(key)?;
    if save {
        store.save_document(title)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::store_with_people;
    use tempfile::TempDir;

    async fn value_at(store: &SharedStore, key: &str) -> Value {
        let store = store.lock().await;
        store.get_document("people").unwrap().as_json().unwrap().get(key).unwrap().value().unwrap()
    }

    #[tokio::test]
    async fn writes_and_saves() {
        let dir = TempDir::new().unwrap();
        let store = store_with_people(&dir).await;
        let tool = DocumentWriteTool::new(store.clone());

        let result = tool
            .execute(json!({"title": "people", "path": "Manon.city", "value": "Rennes"}))
            .await
            .unwrap();
        assert!(result.success, "{}", result.output);
        assert_eq!(result.output, "Wrote people[Manon][city]");
        assert_eq!(value_at(&store, "Manon").await["city"], "Rennes");

        let mut guard = store.lock().await;
        assert!(!guard.get_document("people").unwrap().is_dirty());
        guard.close_document("people").unwrap();
        guard.load_document("people").unwrap();
        let doc = guard.get_document("people").unwrap().as_json().unwrap();
        assert_eq!(doc.value().unwrap()["Manon"]["city"], "Rennes");
    }

    #[tokio::test]
    async fn unsaved_writes_stay_dirty() {
        let dir = TempDir::new().unwrap();
        let store = store_with_people(&dir).await;
        let tool = DocumentWriteTool::new(store.clone());
        tool.execute(json!({"title": "people", "path": ["Zoe"], "value": {"age": 7}, "save": false}))
            .await
            .unwrap();
        assert_eq!(value_at(&store, "Zoe").await, json!({"age": 7}));
        assert!(store.lock().await.get_document("people").unwrap().is_dirty());
    }

    #[tokio::test]
    async fn write_below_missing_parent_fails_softly() {
        let dir = TempDir::new().unwrap();
        let tool = DocumentWriteTool::new(store_with_people(&dir).await);
        let result = tool
            .execute(json!({"title": "people", "path": "Paul.city", "value": "Brest"}))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn deletes_a_subtree() {
        let dir = TempDir::new().unwrap();
        let store = store_with_people(&dir).await;
        let tool = DocumentDeleteTool::new(store.clone());

        let result = tool
            .execute(json!({"title": "people", "path": "Yann"}))
            .await
            .unwrap();
        assert!(result.success, "{}", result.output);
        let guard = store.lock().await;
        let doc = guard.get_document("people").unwrap().as_json().unwrap();
        assert_eq!(doc.value().unwrap(), json!({"Manon": {"city": "Guignen", "job": "Nurse"}}));
    }

    #[tokio::test]
    async fn delete_needs_a_path() {
        let dir = TempDir::new().unwrap();
        let tool = DocumentDeleteTool::new(store_with_people(&dir).await);
        assert!(tool.execute(json!({"title": "people"})).await.is_err());
        let result = tool
            .execute(json!({"title": "people", "path": "Nobody"}))
            .await
            .unwrap();
        assert!(!result.success);
    }
}
