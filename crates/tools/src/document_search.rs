//! Semantic search across loaded documents.

use crate::{SharedStore, str_arg};
use async_trait::async_trait;
use cairn_core::error::ToolError;
use cairn_core::tool::{Tool, ToolResult};

const DEFAULT_LIMIT: u64 = 15;
const DEFAULT_THRESHOLD: f64 = 0.4;

pub struct DocumentSearchTool {
    store: SharedStore,
}

impl DocumentSearchTool {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn name(&self) -> &str {
        "document_search"
    }

    fn description(&self) -> &str {
        "Search the loaded documents for entries semantically close to a query. \
         Returns, per document title, the matching entries and their scores."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for"
                },
                "titles": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Restrict the search to these documents (default: all loaded)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum hits per document (default 15)",
                    "default": DEFAULT_LIMIT
                },
                "threshold": {
                    "type": "number",
                    "description": "Minimum similarity (default 0.4)",
                    "default": DEFAULT_THRESHOLD
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = str_arg(&arguments, "query")?;
        let limit = arguments["limit"].as_u64().unwrap_or(DEFAULT_LIMIT).min(100) as usize;
        let threshold = arguments["threshold"].as_f64().unwrap_or(DEFAULT_THRESHOLD) as f32;
        let titles: Option<Vec<String>> = match arguments.get("titles") {
            Some(t) if !t.is_null() => Some(
                serde_json::from_value(t.clone())
                    .map_err(|e| ToolError::InvalidArguments(format!("'titles': {e}")))?,
            ),
            _ => None,
        };

        let store = self.store.lock().await;
        match store.search(query, titles.as_deref(), limit, threshold).await {
            Ok(results) => {
                let output = if results.is_empty() {
                    format!("No entries found matching '{query}'.")
                } else {
                    serde_json::to_string_pretty(&results).unwrap_or_default()
                };
                Ok(ToolResult::ok(output, serde_json::to_value(&results).ok()))
            }
            Err(e) => Ok(ToolResult::failed(format!("Document search failed: {e}"))),
        }
    }
}
