//! Document tools for the cairn agent.
//!
//! Each tool wraps the shared [`DocumentStore`] so the model can search,
//! read, edit and create documents by calling it by name. Store failures
//! come back as unsuccessful [`ToolResult`]s the model can read; only
//! malformed arguments are errors.
//!
//! [`ToolResult`]: cairn_core::tool::ToolResult

pub mod document_create;
pub mod document_read;
pub mod document_search;
pub mod document_write;

use cairn_core::error::ToolError;
use cairn_core::tool::ToolRegistry;
use cairn_store::{DocumentStore, Path, path};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use document_create::DocumentCreateTool;
pub use document_read::DocumentReadTool;
pub use document_search::DocumentSearchTool;
pub use document_write::{DocumentDeleteTool, DocumentWriteTool};

/// The store as shared between the session and its tools.
pub type SharedStore = Arc<Mutex<DocumentStore>>;

/// A registry with every document tool bound to `store`.
pub fn default_registry(store: SharedStore) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DocumentSearchTool::new(Arc::clone(&store))));
    registry.register(Box::new(DocumentReadTool::new(Arc::clone(&store))));
    registry.register(Box::new(DocumentWriteTool::new(Arc::clone(&store))));
    registry.register(Box::new(DocumentDeleteTool::new(Arc::clone(&store))));
    registry.register(Box::new(DocumentCreateTool::new(store)));
    registry
}

/// Required string argument.
pub(crate) fn str_arg<'a>(arguments: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    arguments[name]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{name}' argument")))
}

/// A path given as `"users.0.city"` or `["users", 0, "city"]`; absent means the root.
pub(crate) fn path_arg(arguments: &Value, name: &str) -> Result<Path, ToolError> {
    match &arguments[name] {
        Value::Null => Ok(Vec::new()),
        Value::String(dotted) => {
            path::parse_dotted(dotted).map_err(|e| ToolError::InvalidArguments(e.to_string()))
        }
        keys @ Value::Array(_) => serde_json::from_value(keys.clone())
            .map_err(|e| ToolError::InvalidArguments(format!("'{name}': {e}"))),
        other => Err(ToolError::InvalidArguments(format!(
            "'{name}' must be a dotted string or an array of keys, got {other}"
        ))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::SharedStore;
    use cairn_providers::HashingProvider;
    use cairn_store::{DocumentKind, DocumentSource, DocumentStore, EmbeddingGateway, RetryPolicy};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    /// A store in `dir` holding a `people` JSON document.
    pub async fn store_with_people(dir: &TempDir) -> SharedStore {
        let gateway = Arc::new(EmbeddingGateway::new(
            Arc::new(HashingProvider::new()),
            "hash",
            RetryPolicy::default(),
        ));
        let mut store = DocumentStore::new(dir.path(), gateway).unwrap().with_defaults(5, 64);
        store
            .new_document(
                DocumentKind::Json,
                "people",
                DocumentSource::Value(json!({
                    "Manon": {"city": "Guignen", "job": "Nurse"},
                    "Yann": {"city": "Rennes", "pets": ["cat"]}
                })),
                "People we know",
                None,
                None,
            )
            .await
            .unwrap();
        Arc::new(Mutex::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::Key;
    use serde_json::json;

    #[test]
    fn paths_from_strings_and_arrays() {
        let expected = vec![Key::from("users"), Key::from(0), Key::from("city")];
        assert_eq!(path_arg(&json!({"path": "users.0.city"}), "path").unwrap(), expected);
        assert_eq!(
            path_arg(&json!({"path": ["users", 0, "city"]}), "path").unwrap(),
            expected
        );
        assert!(path_arg(&json!({}), "path").unwrap().is_empty());
        assert!(path_arg(&json!({"path": 3}), "path").is_err());
    }

    #[tokio::test]
    async fn registry_holds_every_tool() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = testing::store_with_people(&dir).await;
        let registry = default_registry(store);
        assert_eq!(
            registry.names(),
            vec![
                "document_create",
                "document_delete",
                "document_read",
                "document_search",
                "document_write"
            ]
        );
        assert_eq!(registry.header_messages().len(), 5);
    }
}
