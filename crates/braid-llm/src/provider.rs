use async_trait::async_trait;
use braid_core::{Message, Result};

/// Trait for generating text embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of texts.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// The dimensionality of the output embeddings.
    fn dimensions(&self) -> usize;

    /// Provider name.
    fn name(&self) -> &str;
}

/// A request to the reasoning layer: the fully assembled context for one turn.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    /// The model to use, e.g. "gpt-4o-mini".
    pub model: String,
    /// Augmented, trimmed conversation context. The system preamble and any
    /// injected memory block are already in here as system messages.
    pub messages: Vec<Message>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature.
    pub temperature: f32,
}

/// The reasoning layer's reply for one turn.
#[derive(Debug, Clone)]
pub struct ReasoningResponse {
    /// The assistant message to append to the session.
    pub message: Message,
    /// Names of tools the reasoning layer invoked while producing the reply.
    /// Informational only; tool execution is opaque to the core.
    pub tools_used: Vec<String>,
}

/// Trait implemented by each reasoning backend (OpenAI, local, mock).
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Provider name, e.g. "openai".
    fn name(&self) -> &str;

    /// Produce the assistant reply for an assembled context.
    async fn respond(&self, request: &ReasoningRequest) -> Result<ReasoningResponse>;
}
