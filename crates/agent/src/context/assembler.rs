//! Context assembly.
//!
//! Builds the bounded message list sent to the completion provider:
//!
//! 1. **Headers** are rendered from their templates and always included.
//! 2. **Retrieval** searches the loaded documents with the last two queued
//!    messages and, if anything scores, adds one temp message (lasting 1).
//! 3. **Budget**: `token_limit - max_response_tokens` minus the tokens of
//!    headers, temp messages and the retrieval message.
//! 4. **Recency window**: queued messages newest-first while they fit,
//!    stopping at the first that does not.
//! 5. Result = headers, then temp + window + retrieval by timestamp.
//! 6. One decay pass runs over the whole history.

use crate::history::MessageHistory;
use crate::template::{self, TemplateVars};
use cairn_config::ContextConfig;
use cairn_core::error::StoreError;
use cairn_core::message::{Message, MessageKind};
use cairn_core::token;
use cairn_store::DocumentStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the synthetic retrieval message.
pub const RETRIEVAL_NAME: &str = "Retrieval";

/// First line of the retrieval message.
pub const RETRIEVAL_PREAMBLE: &str = "Document Store's current auto-retrieval results:\n";

/// The messages for one completion call, plus how they were chosen.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub messages: Vec<Message>,
    pub metadata: AssemblyMetadata,
}

/// Token accounting for one assembly pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Tokens of headers, temp messages and retrieval together
    pub overhead_tokens: usize,
    /// Budget left for queued messages
    pub available_tokens: usize,
    /// Tokens of the queued messages actually included
    pub history_tokens: usize,
    pub queued_included: usize,
    pub queued_total: usize,
    /// Whether a retrieval message was added
    pub retrieved: bool,
    /// Messages removed by the decay pass
    pub decayed: usize,
}

/// Turns a history into a token-bounded context.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    token_limit: usize,
    max_response_tokens: usize,
    retrieval_limit: usize,
    retrieval_threshold: f32,
}

impl ContextAssembler {
    pub fn new(token_limit: usize, max_response_tokens: usize) -> Self {
        Self {
            token_limit,
            max_response_tokens,
            retrieval_limit: 15,
            retrieval_threshold: 0.4,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.token_limit, config.max_response_tokens)
            .with_retrieval(config.retrieval_limit, config.retrieval_threshold)
    }

    pub fn with_retrieval(mut self, limit: usize, threshold: f32) -> Self {
        self.retrieval_limit = limit;
        self.retrieval_threshold = threshold;
        self
    }

    /// Run the full pipeline for one turn, including the decay pass.
    pub async fn assemble(
        &self,
        history: &mut MessageHistory,
        store: &DocumentStore,
        vars: &TemplateVars,
    ) -> Result<AssembledContext, StoreError> {
        let retrieved = self.retrieve(history, store).await?;
        let mut context = self.select(history, vars, retrieved);
        context.metadata.decayed = history.decay();
        debug!(
            messages = context.messages.len(),
            queued = context.metadata.queued_included,
            available = context.metadata.available_tokens,
            decayed = context.metadata.decayed,
            "Context assembled"
        );
        Ok(context)
    }

    /// Search loaded documents with the last two queued messages.
    ///
    /// `None` when nothing is loaded, the query is blank, or no document
    /// produced a hit.
    pub async fn retrieve(
        &self,
        history: &MessageHistory,
        store: &DocumentStore,
    ) -> Result<Option<Message>, StoreError> {
        if store.loaded_count() == 0 {
            return Ok(None);
        }
        let query = token::pack_messages(history.last_queued(2));
        if query.trim().is_empty() {
            return Ok(None);
        }

        let mut results = store
            .search(&query, None, self.retrieval_limit, self.retrieval_threshold)
            .await?;
        if results.is_empty() {
            return Ok(None);
        }
        results.by_title.retain(|(_, hits)| !hits.is_empty());

        let payload = serde_json::to_string(&results)
            .map_err(|e| StoreError::InvalidContent(format!("retrieval payload: {e}")))?;
        debug!(hits = results.total_hits(), "Auto-retrieval produced results");
        Ok(Some(Message::temp(
            RETRIEVAL_NAME,
            format!("{RETRIEVAL_PREAMBLE}{payload}"),
            1,
        )))
    }

    /// Choose the messages for this turn. Pure: no search, no decay.
    pub fn select(
        &self,
        history: &MessageHistory,
        vars: &TemplateVars,
        retrieved: Option<Message>,
    ) -> AssembledContext {
        let headers: Vec<Message> = history
            .of_kind(MessageKind::Header)
            .map(|h| {
                let mut rendered = h.clone();
                rendered.content = template::render(&h.content, vars);
                rendered
            })
            .collect();
        let temp: Vec<&Message> = history.of_kind(MessageKind::Temp).collect();
        let queued: Vec<&Message> = history.of_kind(MessageKind::Queued).collect();

        let overhead_tokens = token::estimate_messages_tokens(
            headers
                .iter()
                .chain(temp.iter().copied())
                .chain(retrieved.iter()),
        );
        let available_tokens = self
            .token_limit
            .saturating_sub(self.max_response_tokens)
            .saturating_sub(overhead_tokens);

        let mut history_tokens = 0;
        let mut recent: Vec<&Message> = Vec::new();
        for message in queued.iter().rev() {
            let tokens = token::estimate_messages_tokens([*message]);
            if history_tokens + tokens > available_tokens {
                break;
            }
            history_tokens += tokens;
            recent.push(message);
        }

        let queued_included = recent.len();
        let retrieved_flag = retrieved.is_some();
        let mut body: Vec<Message> = temp
            .into_iter()
            .chain(recent)
            .cloned()
            .chain(retrieved)
            .collect();
        body.sort_by_key(|m| m.timestamp);

        let mut messages = headers;
        messages.extend(body);

        AssembledContext {
            messages,
            metadata: AssemblyMetadata {
                overhead_tokens,
                available_tokens,
                history_tokens,
                queued_included,
                queued_total: queued.len(),
                retrieved: retrieved_flag,
                decayed: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::message::Role;
    use cairn_providers::HashingProvider;
    use cairn_store::{DocumentKind, DocumentSource, EmbeddingGateway, RetryPolicy};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> DocumentStore {
        let gateway = Arc::new(EmbeddingGateway::new(
            Arc::new(HashingProvider::new()),
            "hash",
            RetryPolicy::default(),
        ));
        DocumentStore::new(dir.path(), gateway).unwrap().with_defaults(5, 64)
    }

    /// 40 chars of content → "User:\n" + 40 + "\n\n" = 48 chars = 12 tokens.
    fn turn(i: i64) -> Message {
        Message::user("User", format!("{:0>40}", i)).at(Utc::now() + Duration::seconds(i))
    }

    #[test]
    fn recency_window_stops_at_first_overflow() {
        let mut history = MessageHistory::new(1000);
        for i in 0..5 {
            history.add(turn(i));
        }
        // 100 - 60 = 40 tokens available: three 12-token turns fit.
        let assembler = ContextAssembler::new(100, 60);
        let context = assembler.select(&history, &TemplateVars::new(), None);
        assert_eq!(context.metadata.available_tokens, 40);
        assert_eq!(context.metadata.queued_included, 3);
        assert_eq!(context.metadata.history_tokens, 36);
        let contents: Vec<_> = context.messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(
            contents,
            vec![format!("{:0>40}", 2), format!("{:0>40}", 3), format!("{:0>40}", 4)]
        );
    }

    #[test]
    fn newest_message_alone_fits() {
        let mut history = MessageHistory::new(1000);
        history.add(turn(0));
        history.add(turn(1));
        let context = ContextAssembler::new(100, 88).select(&history, &TemplateVars::new(), None);
        assert_eq!(context.metadata.queued_included, 1);
        assert_eq!(context.messages[0].content, format!("{:0>40}", 1));
    }

    #[test]
    fn headers_first_and_rendered() {
        let mut history = MessageHistory::new(1000);
        history.add(turn(0));
        history.add(Message::header("Instructions", "You are <<<name>>>."));
        history.add(Message::temp("Observation", "it rained", 2).at(Utc::now() - Duration::seconds(5)));
        let vars = TemplateVars::from([("name".to_string(), "Pip".to_string())]);

        let context = ContextAssembler::new(1000, 100).select(&history, &vars, None);
        let names: Vec<_> = context.messages.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Instructions", "Observation", "User"]);
        assert_eq!(context.messages[0].content, "You are Pip.");
        assert_eq!(context.messages[0].role, Role::System);
    }

    #[test]
    fn overhead_shrinks_the_window() {
        let mut history = MessageHistory::new(1000);
        for i in 0..3 {
            history.add(turn(i));
        }
        history.add(Message::header("Instructions", "x".repeat(400)));
        let context = ContextAssembler::new(150, 20).select(&history, &TemplateVars::new(), None);
        assert!(context.metadata.overhead_tokens > 100);
        assert!(context.metadata.history_tokens <= context.metadata.available_tokens);
        assert!(context.metadata.queued_included < 3);
    }

    #[tokio::test]
    async fn retrieval_is_skipped_without_documents() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut history = MessageHistory::new(1000);
        history.add(Message::user("User", "where does Manon live?"));
        let assembler = ContextAssembler::new(1000, 100);
        assert!(assembler.retrieve(&history, &store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retrieval_adds_one_shot_message() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store
            .new_document(
                DocumentKind::Json,
                "people",
                DocumentSource::Value(json!({"Manon": {"city": "Guignen", "job": "Nurse"}})),
                "People",
                None,
                None,
            )
            .await
            .unwrap();

        let mut history = MessageHistory::new(1000);
        history.add(Message::user("User", "Manon city Guignen"));
        let assembler = ContextAssembler::new(4000, 100).with_retrieval(15, 0.1);

        let context = assembler
            .assemble(&mut history, &store, &TemplateVars::new())
            .await
            .unwrap();
        assert!(context.metadata.retrieved);
        let retrieval = context.messages.last().unwrap();
        assert_eq!(retrieval.name, RETRIEVAL_NAME);
        assert_eq!(retrieval.kind, MessageKind::Temp);
        assert_eq!(retrieval.lasting, 1);
        assert!(retrieval.content.starts_with(RETRIEVAL_PREAMBLE));
        let payload: serde_json::Value =
            serde_json::from_str(&retrieval.content[RETRIEVAL_PREAMBLE.len()..]).unwrap();
        assert!(payload["people"][0]["text"].as_str().unwrap().contains("Guignen"));

        // the retrieval message was never stored, so the history only decays its own
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn assemble_decays_the_whole_history() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut history = MessageHistory::new(1000);
        let now = Utc::now();
        history.add(Message::user("User", "hi").at(now));
        history.add(Message::temp("Observation", "once", 1).at(now + Duration::seconds(1)));
        history.add(Message::temp("Observation", "twice", 2).at(now + Duration::seconds(2)));
        let assembler = ContextAssembler::new(1000, 100);

        let first = assembler
            .assemble(&mut history, &store, &TemplateVars::new())
            .await
            .unwrap();
        assert_eq!(first.messages.len(), 3);
        assert_eq!(first.metadata.decayed, 1);

        let second = assembler
            .assemble(&mut history, &store, &TemplateVars::new())
            .await
            .unwrap();
        let contents: Vec<_> = second.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "twice"]);

        let third = assembler
            .assemble(&mut history, &store, &TemplateVars::new())
            .await
            .unwrap();
        assert_eq!(third.messages.len(), 1);
    }
}
