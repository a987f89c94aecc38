//! A conversation with one agent over a shared document store.

use crate::collector::{CaptureScope, MessageCollector, Sender};
use crate::context::{AssembledContext, ContextAssembler};
use crate::history::{MessageHistory, STOP_MARKER};
use crate::template::TemplateVars;
use cairn_config::AppConfig;
use cairn_core::error::{Error, ProviderError};
use cairn_core::message::{Message, Role};
use cairn_core::provider::{Provider, ProviderRequest};
use cairn_core::tool::ToolRegistry;
use cairn_store::DocumentStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Instructions used when no `preprompt` is configured.
pub const DEFAULT_PREPROMPT: &str = "You are <<<name>>>, an assistant talking with <<<username>>>. \
Today is <<<date>>>.\n\
Loaded documents: <<<documents>>>. Relevant entries from them are retrieved \
automatically and shown to you as `Retrieval` messages.\n\
Keep anything worth remembering about <<<username>>> or the ongoing work in the \
`memory` document, using the document tools.\n\
End every reply with #SUBMIT#.";

/// Description given to a newly created memory document.
pub const MEMORY_DESCRIPTION: &str = "Memory storage of the AI assistant";

/// Drives the turn cycle: collect the prompt, assemble context, stream the
/// completion back into the history.
pub struct Session {
    /// The completion provider
    provider: Arc<dyn Provider>,

    /// Shared with the document tools
    store: Arc<Mutex<DocumentStore>>,

    collector: MessageCollector,
    assembler: ContextAssembler,

    /// Caller-supplied template variables; built-ins are added per turn
    vars: TemplateVars,

    model: String,
    temperature: f32,
    top_p: f32,
    max_response_tokens: usize,
    completion_timeout: Duration,
    name: String,
    username: String,
    observation_lasting: u32,
    memory_document: String,
}

impl Session {
    pub fn new(config: &AppConfig, provider: Arc<dyn Provider>, store: Arc<Mutex<DocumentStore>>) -> Self {
        let history = MessageHistory::new(config.context.max_message_tokens);
        let sender = Sender::new(Role::User, config.agent.username.clone());
        let mut session = Self {
            provider,
            store,
            collector: MessageCollector::new(history, sender),
            assembler: ContextAssembler::from_config(&config.context),
            vars: TemplateVars::new(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_response_tokens: config.context.max_response_tokens,
            completion_timeout: Duration::from_secs(config.context.completion_timeout_secs),
            name: config.agent.name.clone(),
            username: config.agent.username.clone(),
            observation_lasting: config.context.observation_lasting,
            memory_document: config.agent.memory_document.clone(),
        };
        let preprompt = config.agent.preprompt.as_deref().unwrap_or(DEFAULT_PREPROMPT);
        session.add_header("Instructions", preprompt);
        session
    }

    /// Create the memory document if the store has none, then load it.
    pub async fn init_memory(&self) -> Result<(), Error> {
        if self.memory_document.is_empty() {
            return Ok(());
        }
        self.store
            .lock()
            .await
            .ensure_json_document(&self.memory_document, MEMORY_DESCRIPTION)
            .await?;
        debug!(title = %self.memory_document, "Memory document ready");
        Ok(())
    }

    /// Describe every registered tool in a header.
    pub fn with_tools(mut self, tools: &ToolRegistry) -> Self {
        for header in tools.header_messages() {
            self.collector.history_mut().add(header);
        }
        self
    }

    pub fn add_header(&mut self, name: &str, template: &str) {
        self.collector.history_mut().add(Message::header(name, template));
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Add a temporary `Observation` that lives for `lasting` turns
    /// (the configured default when `None`).
    pub fn observe(&mut self, text: &str, lasting: Option<u32>) {
        let lasting = lasting.unwrap_or(self.observation_lasting);
        self.collector.flush();
        self.collector
            .history_mut()
            .add(Message::temp("Observation", text, lasting));
    }

    /// Attribute written output to `role`/`name` while the scope lives.
    pub fn capture(&mut self, role: Role, name: impl Into<String>) -> CaptureScope<'_> {
        self.collector.capture(role, name)
    }

    pub fn history(&self) -> &MessageHistory {
        self.collector.history()
    }

    pub fn store(&self) -> Arc<Mutex<DocumentStore>> {
        Arc::clone(&self.store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one turn and return the assistant's reply.
    pub async fn respond(&mut self, prompt: &str) -> Result<String, Error> {
        self.respond_streaming(prompt, |_| {}).await
    }

    /// Like [`respond`](Self::respond), calling `on_token` for every
    /// streamed fragment.
    pub async fn respond_streaming<F>(&mut self, prompt: &str, mut on_token: F) -> Result<String, Error>
    where
        F: FnMut(&str) + Send,
    {
        if !prompt.trim().is_empty() {
            self.collector
                .collect(Message::user(self.username.clone(), prompt));
        }
        self.collector.flush();

        let context = self.assemble().await?;
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: context.messages,
            temperature: self.temperature,
            top_p: Some(self.top_p),
            max_tokens: u32::try_from(self.max_response_tokens).ok(),
            stream: true,
            stop: vec![STOP_MARKER.to_string()],
        };
        info!(
            provider = self.provider.name(),
            model = %self.model,
            messages = request.messages.len(),
            "Requesting completion"
        );

        let provider = Arc::clone(&self.provider);
        let collector = &mut self.collector;
        let name = self.name.clone();
        let streamed = tokio::time::timeout(self.completion_timeout, async {
            let mut rx = provider.stream(request).await?;
            let mut reply = String::new();
            while let Some(chunk) = rx.recv().await {
                let chunk = chunk?;
                if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                    on_token(&content);
                    reply.push_str(&content);
                    collector.collect(Message::assistant(name.clone(), content));
                }
                if chunk.done {
                    break;
                }
            }
            Ok::<_, ProviderError>(reply)
        })
        .await;

        let result = match streamed {
            Ok(Ok(reply)) => {
                self.collector.collect(Message::assistant(self.name.clone(), "\n"));
                Ok(reply.trim().to_string())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout(format!(
                "no completion within {}s",
                self.completion_timeout.as_secs()
            ))),
        };
        self.collector.flush();

        match result {
            Ok(reply) => {
                debug!(chars = reply.len(), "Completion received");
                Ok(reply)
            }
            Err(e) => {
                warn!("Completion failed: {e}");
                Err(Error::Provider(e))
            }
        }
    }

    /// Assemble the context for the next completion without sending it.
    ///
    /// Decays the history like a real turn.
    pub async fn assemble(&mut self) -> Result<AssembledContext, Error> {
        let store = self.store.lock().await;
        let mut vars = self.vars.clone();
        vars.entry("name".into()).or_insert_with(|| self.name.clone());
        vars.entry("username".into())
            .or_insert_with(|| self.username.clone());
        vars.entry("date".into())
            .or_insert_with(|| Utc::now().format("%Y-%m-%d").to_string());
        vars.entry("documents".into()).or_insert_with(|| {
            store
                .get_loaded()
                .iter()
                .map(|d| d.title.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        });

        let context = self
            .assembler
            .assemble(self.collector.history_mut(), &store, &vars)
            .await?;
        Ok(context)
    }
}
