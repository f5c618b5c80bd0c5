use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use braid_config::BraidConfig;
use braid_core::{BraidError, IdentityId, Message, Result, Role, SessionId};
use braid_llm::{ReasoningProvider, ReasoningRequest};
use braid_memory::{MemoryItem, MemoryKind, MemoryStore, RetrievalEngine, SessionRecord};

use crate::context::{format_memory_snippet, trim_context};
use crate::session::SessionManager;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with long-term memory. \
    When relevant prior context is provided, use it naturally; do not claim to remember \
    things that are not in it.";

/// Per-turn settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// System prompt seeded into every new session.
    pub system_prompt: String,
    /// Context budget per reasoning call, in messages.
    pub max_messages: usize,
    /// Memory items surfaced per turn.
    pub memory_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            max_tokens: 1024,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_messages: 40,
            memory_k: 4,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &BraidConfig) -> Self {
        Self {
            model: config.reasoning.model.clone(),
            max_tokens: config.reasoning.max_tokens,
            temperature: config.reasoning.temperature,
            system_prompt: config
                .reasoning
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into()),
            max_messages: config.context.max_messages,
            memory_k: config.retrieval.k,
        }
    }
}

/// Drives one conversation turn: persist the human message, recall memory,
/// assemble and trim the context, call the reasoning provider, persist the
/// reply, and condense the exchange back into memory.
///
/// Turns on the same session are serialized by the session's run lock; turns
/// on different sessions run concurrently.
pub struct Orchestrator {
    store: Arc<MemoryStore>,
    engine: RetrievalEngine,
    reasoner: Arc<dyn ReasoningProvider>,
    sessions: SessionManager,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<MemoryStore>,
        engine: RetrievalEngine,
        reasoner: Arc<dyn ReasoningProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        let sessions = SessionManager::new(Arc::clone(&store));
        Self {
            store,
            engine,
            reasoner,
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Create a session for `owner`, seeded with the system prompt.
    pub fn create_session(&self, owner: IdentityId, name: &str) -> Result<SessionRecord> {
        let record = self.sessions.create(owner, name)?;
        let seed = Message::text(record.id, Role::System, &self.config.system_prompt);
        self.store.append_session_message(&seed)?;
        info!(session = %record.id, %owner, "created session");
        Ok(record)
    }

    /// Run one conversation turn and return the assistant's reply.
    ///
    /// The human message is persisted before the reasoning call, so a failed
    /// turn leaves the log with the question but no answer — retrying the
    /// reasoning step is the caller's choice. A failed memory write after a
    /// successful reply is logged and tolerated: the reply already happened.
    pub async fn handle_message(&self, session_id: SessionId, text: &str) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BraidError::Validation("empty message".into()));
        }
        let owner = self
            .sessions
            .owner(session_id)?
            .ok_or_else(|| BraidError::Validation(format!("unknown session: {}", session_id)))?;

        let session_lock = self.sessions.run_lock(session_id).await;
        let _run_guard = session_lock.lock().await;

        let human = Message::text(session_id, Role::Human, text);
        self.store.append_session_message(&human)?;

        // RECALL — own memory plus whatever peers have shared.
        let hits = self
            .engine
            .retrieve(owner, text, self.config.memory_k)
            .await?;

        // ASSEMBLE — session log, memory snippet after the system prefix,
        // then trim to the context budget.
        let mut messages = self.store.load_session_messages(session_id)?;
        if !hits.is_empty() {
            let names = self.owner_names(&hits)?;
            let snippet = format_memory_snippet(&hits, owner, &names);
            let insert_at = messages
                .iter()
                .take_while(|m| m.role == Role::System)
                .count();
            messages.insert(insert_at, Message::text(session_id, Role::System, snippet));
            debug!(session = %session_id, hits = hits.len(), "injected memory snippet");
        }
        let messages = trim_context(&messages, self.config.max_messages);

        // THINK
        let request = ReasoningRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self.reasoner.respond(&request).await?;

        let mut reply = response.message;
        reply.session_id = session_id;
        self.store.append_session_message(&reply)?;

        // REMEMBER — condense the exchange into one memory item. The reply
        // has already been persisted and returned to the user, so a failure
        // here degrades future recall but must not fail the turn.
        let record = format!("Q: {}\nA: {}", text, reply.text_content());
        if let Err(e) = self.store.append(owner, &record, MemoryKind::Turn).await {
            warn!(session = %session_id, error = %e, "failed to write turn memory");
        }

        Ok(reply)
    }

    /// Resolve display names for every foreign owner among the hits.
    fn owner_names(&self, hits: &[(MemoryItem, f32)]) -> Result<HashMap<IdentityId, String>> {
        let mut names = HashMap::new();
        for (item, _) in hits {
            if names.contains_key(&item.owner_id) {
                continue;
            }
            if let Some(record) = self.store.get_identity(item.owner_id)? {
                names.insert(item.owner_id, record.name);
            }
        }
        Ok(names)
    }
}
