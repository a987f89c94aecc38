//! Create a new document from a value, text, or a file.

use crate::{SharedStore, str_arg};
use async_trait::async_trait;
use cairn_core::error::ToolError;
use cairn_core::tool::{Tool, ToolResult};
use cairn_store::{DocumentKind, DocumentSource};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::debug;

pub struct DocumentCreateTool {
    store: SharedStore,
}

impl DocumentCreateTool {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DocumentCreateTool {
    fn name(&self) -> &str {
        "document_create"
    }

    fn description(&self) -> &str {
        "Create and save a document. JSON documents take any JSON value as content; \
         text documents take a string and are split into searchable chunks. \
         Either kind may instead be read from a file. Replaces a document with the same title."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Unique document title" },
                "kind": { "type": "string", "enum": ["json", "text"], "default": "json" },
                "content": { "description": "Initial content" },
                "file": { "type": "string", "description": "Read the content from this file instead" },
                "description": { "type": "string", "description": "What the document holds" }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let title = str_arg(&arguments, "title")?;
        let kind: DocumentKind = arguments["kind"]
            .as_str()
            .unwrap_or("json")
            .parse()
            .map_err(|e| ToolError::InvalidArguments(format!("'kind': {e}")))?;
        let description = arguments["description"].as_str().unwrap_or_default();

        let source = match (arguments["file"].as_str(), kind, &arguments["content"]) {
            (Some(file), _, _) => DocumentSource::File(PathBuf::from(file)),
            (None, DocumentKind::Json, Value::Null) => DocumentSource::Value(json!({})),
            (None, DocumentKind::Text, Value::Null) => DocumentSource::Text(String::new()),
            (None, _, content) => DocumentSource::Value(content.clone()),
        };

        debug!(title, kind = %kind, "Creating document");
        let mut store = self.store.lock().await;
        Ok(
            match store
                .new_document(kind, title, source, description, None, None)
                .await
            {
                Ok(doc) => {
                    let entries = doc.data().content.len();
                    ToolResult::ok(
                        format!("Created {kind} document '{title}' with {entries} entries"),
                        Some(json!({"title": title, "kind": kind.to_string(), "entries": entries})),
                    )
                }
                Err(e) => ToolResult::failed(format!("Creating '{title}' failed: {e}")),
            },
        )
    }
}
