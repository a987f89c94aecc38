//! End-to-end integration tests for cairn.
//!
//! These drive the full pipeline with a scripted completion provider and the
//! hashing embedder: create → edit → save → reload → search → assemble →
//! respond, plus the document tools and failure paths.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cairn_agent::{ContextAssembler, MessageHistory, STOP_MARKER, Session, TemplateVars};
use cairn_config::{AppConfig, ClosePolicy};
use cairn_core::error::{Error, ProviderError, StoreError};
use cairn_core::message::{Message, MessageKind};
use cairn_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use cairn_core::tool::ToolCall;
use cairn_providers::HashingProvider;
use cairn_store::{DocumentKind, DocumentSource, DocumentStore, Key};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Mutex;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Streams scripted replies in fragments, embeds with the hashing
/// embedder, and records every completion request.
struct ScriptedProvider {
    replies: std::sync::Mutex<VecDeque<Vec<String>>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
    embed_calls: AtomicUsize,
    /// Embedding calls after this many fail with a non-transient error
    embed_budget: Option<usize>,
}

impl ScriptedProvider {
    fn new(replies: &[&[&str]]) -> Arc<Self> {
        Arc::new(Self {
            replies: std::sync::Mutex::new(
                replies
                    .iter()
                    .map(|r| r.iter().map(|s| s.to_string()).collect())
                    .collect(),
            ),
            requests: std::sync::Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
            embed_budget: None,
        })
    }

    fn embedding_only_for(calls: usize) -> Arc<Self> {
        Arc::new(Self {
            replies: std::sync::Mutex::new(VecDeque::new()),
            requests: std::sync::Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
            embed_budget: Some(calls),
        })
    }

    fn last_request(&self) -> ProviderRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no completion was requested")
    }

    fn next_reply(&self, request: ProviderRequest) -> Vec<String> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider exhausted")
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            content: self.next_reply(request).concat(),
            usage: None,
            model: "mock".into(),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let fragments = self.next_reply(request);
        let (tx, rx) = tokio::sync::mpsc::channel(fragments.len() + 1);
        for fragment in fragments {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(fragment),
                    done: false,
                    usage: None,
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                done: true,
                usage: None,
            }))
            .await;
        Ok(rx)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let call = self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.embed_budget.is_some_and(|budget| call >= budget) {
            return Err(ProviderError::AuthenticationFailed("key revoked".into()));
        }
        HashingProvider::new().embed(request).await
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.store.folder = Some(dir.path().to_path_buf());
    config.embedding.dimensions = 128;
    config.context.retrieval_threshold = 0.2;
    config.agent.name = "Pip".into();
    config.agent.preprompt = Some("You are <<<name>>>. Loaded: <<<documents>>>.".into());
    config
}

fn team() -> serde_json::Value {
    json!({
        "users": [
            {"name": "Ana", "city": "Rouen"},
            {"name": "Bob", "city": "Lyon"}
        ],
        "settings": {}
    })
}

async fn store_with_team(config: &AppConfig, provider: Arc<dyn Provider>) -> DocumentStore {
    let mut store = DocumentStore::from_config(config, provider).unwrap();
    store
        .new_document(
            DocumentKind::Json,
            "team",
            DocumentSource::Value(team()),
            "Who is on the team",
            None,
            None,
        )
        .await
        .unwrap();
    store
}

// ── E2E: Document lifecycle ──────────────────────────────────────────────

#[tokio::test]
async fn e2e_create_edit_save_reload_search() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let provider = ScriptedProvider::new(&[]);
    let mut store = store_with_team(&config, provider.clone()).await;
    assert!(dir.path().join("team.json").is_file());

    // edit through the item views
    {
        let doc = store.json_document_mut("team").unwrap();
        let users = vec![Key::from("users"), Key::from(1)];
        doc.item_mut(&users).unwrap().set("city", json!("Paris")).await.unwrap();
        doc.set("settings", json!({"theme": "dark"})).await.unwrap();
        assert!(doc.is_dirty());
    }
    store.save_document("team").unwrap();
    assert!(store.close_document("team").unwrap());

    // a fresh store over the same folder sees the edits
    let mut fresh = DocumentStore::from_config(&config, provider.clone()).unwrap();
    assert_eq!(fresh.get_titles().unwrap(), vec!["team"]);
    fresh.load_document("team").unwrap();
    let doc = fresh.get_document("team").unwrap();
    assert_eq!(doc.description(), "Who is on the team");
    let value = doc.as_json().unwrap().value().unwrap();
    assert_eq!(value["users"][1], json!({"name": "Bob", "city": "Paris"}));
    assert_eq!(value["users"][0]["city"], "Rouen");
    assert_eq!(value["settings"], json!({"theme": "dark"}));

    let results = fresh.search("Bob city Paris", None, 3, 0.0).await.unwrap();
    let hits = results.get("team").unwrap();
    assert_eq!(hits[0].text, r#"team[users][1][city]="Paris""#);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn e2e_close_policy_save_persists_edits() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.store.close_policy = ClosePolicy::Save;
    let provider = ScriptedProvider::new(&[]);
    let mut store = store_with_team(&config, provider.clone()).await;

    store.json_document_mut("team").unwrap().delete("settings").unwrap();
    store.close_document("team").unwrap();

    store.load_document("team").unwrap();
    let value = store.get_document("team").unwrap().as_json().unwrap().value().unwrap();
    assert!(value.get("settings").is_none());
}

#[tokio::test]
async fn e2e_embedding_failure_leaves_document_untouched() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    // enough for the initial load, then the key is revoked
    let provider = ScriptedProvider::embedding_only_for(1);
    let mut store = store_with_team(&config, provider).await;

    let doc = store.json_document_mut("team").unwrap();
    let before = doc.value().unwrap();
    let err = doc.set("users", json!([])).await.unwrap_err();
    assert!(matches!(err, StoreError::ProviderFailure { attempts: 1, .. }));
    assert_eq!(doc.value().unwrap(), before);
    assert!(!doc.is_dirty());
}

#[tokio::test]
async fn e2e_text_document_from_file() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let source = dir.path().join("notes.txt");
    std::fs::write(
        &source,
        "The spare key is under the blue pot. The router password is on the fridge.",
    )
    .unwrap();

    let provider = ScriptedProvider::new(&[]);
    let mut store = DocumentStore::from_config(&config, provider).unwrap();
    store
        .new_document(DocumentKind::Text, "notes", DocumentSource::File(source), "", None, None)
        .await
        .unwrap();

    let results = store.search("spare key blue pot", None, 1, 0.0).await.unwrap();
    let hit = &results.get("notes").unwrap()[0];
    assert!(hit.text.contains("blue pot"));
}

// ── E2E: Context assembly ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_assembler_budget_and_retrieval() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = store_with_team(&config, ScriptedProvider::new(&[])).await;

    let mut history = MessageHistory::new(1000);
    history.add(Message::header("Instructions", "Answer briefly."));
    for i in 0..50 {
        history.add(Message::user("User", format!("filler message number {i} {}", "x".repeat(200))));
    }
    history.add(Message::user("User", "Ana city Rouen"));

    let assembler = ContextAssembler::new(1000, 200).with_retrieval(15, 0.1);
    let context = assembler
        .assemble(&mut history, &store, &TemplateVars::new())
        .await
        .unwrap();

    assert_eq!(context.messages[0].name, "Instructions");
    assert!(context.metadata.retrieved);
    assert!(context.metadata.queued_included < context.metadata.queued_total);
    assert!(context.metadata.history_tokens <= context.metadata.available_tokens);
    let retrieval = context.messages.last().unwrap();
    assert!(retrieval.content.contains(r#"team[users][0][city]=\"Rouen\""#));
    // nothing was deleted from the history, only omitted
    assert_eq!(history.of_kind(MessageKind::Queued).count(), 51);
}

// ── E2E: Session turns ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_session_turn_with_retrieval_and_tools() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let provider = ScriptedProvider::new(&[&["Bob ", "lives in ", "Lyon."], &["Noted."]]);
    let store = Arc::new(Mutex::new(store_with_team(&config, provider.clone()).await));
    let tools = cairn_tools::default_registry(Arc::clone(&store));
    let mut session = Session::new(&config, provider.clone(), Arc::clone(&store)).with_tools(&tools);

    let mut streamed = Vec::new();
    let reply = session
        .respond_streaming("Bob city Lyon", |t| streamed.push(t.to_string()))
        .await
        .unwrap();
    assert_eq!(reply, "Bob lives in Lyon.");
    assert_eq!(streamed, vec!["Bob ", "lives in ", "Lyon."]);

    let request = provider.last_request();
    assert_eq!(request.stop, vec![STOP_MARKER.to_string()]);
    assert_eq!(request.messages[0].content, "You are Pip. Loaded: team.");
    assert_eq!(request.messages.iter().filter(|m| m.name == "Tool").count(), tools.len());
    let retrieval = request.messages.iter().find(|m| m.name == "Retrieval").unwrap();
    assert!(retrieval.content.contains("Lyon"));

    let last = session.history().last().unwrap();
    assert_eq!(last.name, "Pip");
    assert_eq!(last.content, format!("Bob lives in Lyon.\n{STOP_MARKER}"));

    // a tool edit is visible to the next turn through the shared store
    let call = ToolCall {
        name: "document_write".into(),
        arguments: json!({"title": "team", "path": "users.1.city", "value": "Brest"}),
    };
    let result = tools.execute(&call).await.unwrap();
    assert!(result.success, "{}", result.output);
    session.observe(&result.output, Some(1));

    session.respond("Bob city Brest").await.unwrap();
    let request = provider.last_request();
    assert!(request.messages.iter().any(|m| m.name == "Observation"));
    let retrieval = request.messages.iter().find(|m| m.name == "Retrieval").unwrap();
    assert!(retrieval.content.contains("Brest"));
    // the one-shot observation is gone after that turn
    assert_eq!(session.history().of_kind(MessageKind::Temp).count(), 0);

    let saved = std::fs::read_to_string(dir.path().join("team.json")).unwrap();
    assert!(saved.contains("Brest"));
}

#[tokio::test]
async fn e2e_completion_failure_surfaces_as_provider_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.provider = "hashing".into();
    let provider = cairn_providers::build_from_config(&config).unwrap();
    let store = DocumentStore::from_config(&config, Arc::clone(&provider)).unwrap();
    let mut session = Session::new(&config, provider, Arc::new(Mutex::new(store)));

    let err = session.respond("hello").await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::NotConfigured(_))));
    assert_eq!(session.history().of_kind(MessageKind::Queued).count(), 1);
}
