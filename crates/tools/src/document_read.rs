//! Read a document, or one subtree of it, loading it from disk if needed.

use crate::{SharedStore, path_arg, str_arg};
use async_trait::async_trait;
use cairn_core::error::{StoreError, ToolError};
use cairn_core::tool::{Tool, ToolResult};
use cairn_store::{Document, path};
use serde_json::{Value, json};

pub struct DocumentReadTool {
    store: SharedStore,
}

impl DocumentReadTool {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DocumentReadTool {
    fn name(&self) -> &str {
        "document_read"
    }

    fn description(&self) -> &str {
        "Read a document by title. For JSON documents an optional path \
         (\"users.0.city\" or [\"users\", 0, \"city\"]) selects a subtree; \
         text documents return their chunks. Lists persisted titles when called without one."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Document title; omit to list available documents"
                },
                "path": {
                    "description": "Subtree to read, dotted string or array of keys (default: whole document)"
                }
            }
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let mut store = self.store.lock().await;
        if arguments["title"].is_null() {
            return Ok(match store.get_titles() {
                Ok(titles) => {
                    let loaded: Vec<Value> = store
                        .get_loaded()
                        .into_iter()
                        .map(|d| json!({"title": d.title, "description": d.description}))
                        .collect();
                    let data = json!({"titles": titles, "loaded": loaded});
                    ToolResult::ok(serde_json::to_string_pretty(&data).unwrap_or_default(), Some(data))
                }
                Err(e) => ToolResult::failed(format!("Listing documents failed: {e}")),
            });
        }

        let title = str_arg(&arguments, "title")?;
        let path = path_arg(&arguments, "path")?;
        if let Err(e) = store.load_document(title) {
            return Ok(ToolResult::failed(format!("Cannot load '{title}': {e}")));
        }
        let Some(document) = store.get_document(title) else {
            return Ok(ToolResult::failed(format!("Document '{title}' is not loaded")));
        };

        let value = match read(document, &path) {
            Ok(value) => value,
            Err(e) => return Ok(ToolResult::failed(format!("Reading '{title}' failed: {e}"))),
        };
        let output = serde_json::to_string_pretty(&value).unwrap_or_default();
        Ok(ToolResult::ok(output, Some(value)))
    }
}

fn read(document: &Document, at: &[cairn_store::Key]) -> Result<Value, StoreError> {
    match document {
        Document::Json(doc) => doc.item(at)?.value(),
        Document::Text(doc) => {
            if !at.is_empty() {
                return Err(StoreError::InvalidPath(format!(
                    "text documents have no subtrees: {}",
                    path::encode(at)
                )));
            }
            Ok(doc
                .chunks()
                .map(|(start, end, text)| json!({"start": start, "end": end, "text": text}))
                .collect())
        }
    }
}
