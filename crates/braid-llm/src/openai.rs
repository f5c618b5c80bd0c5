use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use braid_core::{BraidError, Message, MessageContent, Result, Role};

use crate::provider::{EmbeddingProvider, ReasoningProvider, ReasoningRequest, ReasoningResponse};

/// OpenAI embeddings provider (text-embedding-3-small, text-embedding-3-large, etc.)
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedding {
    /// Create an OpenAI embedding provider with text-embedding-3-small (1536 dims).
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
            dims: 1536,
        }
    }

    /// Use a specific model (e.g. "text-embedding-3-large" with 3072 dims).
    pub fn with_model(mut self, model: String, dims: usize) -> Self {
        self.model = model;
        self.dims = dims;
        self
    }

    /// Use a custom base URL (e.g. for Azure OpenAI).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(model = %self.model, count = texts.len(), "generating embeddings");

        let body = serde_json::json!({
            "model": &self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| BraidError::Provider(format!("embedding request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BraidError::Provider(format!(
                "embedding HTTP {}: {}",
                status, text
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BraidError::Provider(format!("embedding parse error: {}", e)))?;

        let embeddings: Vec<Vec<f32>> = data["data"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        item["embedding"].as_array().map(|arr| {
                            arr.iter()
                                .filter_map(|v| v.as_f64().map(|f| f as f32))
                                .collect()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if embeddings.len() != texts.len() {
            return Err(BraidError::Provider(format!(
                "embedding count mismatch: sent {}, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// OpenAI chat-completions reasoning backend.
pub struct OpenAiReasoner {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiReasoner {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn wire_role(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::Human => "user",
            Role::Ai => "assistant",
            // Tool output is replayed as plain context; the wire-level
            // tool-call pairing belongs to the turn that produced it.
            Role::Tool => "user",
        }
    }

    fn wire_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                let content = match &m.content {
                    MessageContent::Text { text } => text.clone(),
                    MessageContent::ToolExchange {
                        tool_name, output, ..
                    } => format!("[tool {} output] {}", tool_name, output),
                };
                serde_json::json!({
                    "role": Self::wire_role(m.role),
                    "content": content,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiReasoner {
    fn name(&self) -> &str {
        "openai"
    }

    async fn respond(&self, request: &ReasoningRequest) -> Result<ReasoningResponse> {
        debug!(model = %request.model, messages = request.messages.len(), "reasoning request");

        let body = serde_json::json!({
            "model": &request.model,
            "messages": Self::wire_messages(&request.messages),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| BraidError::Reasoning(format!("chat request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BraidError::Reasoning(format!(
                "chat HTTP {}: {}",
                status, text
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BraidError::Reasoning(format!("chat parse error: {}", e)))?;

        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BraidError::Reasoning("chat response missing content".into()))?
            .to_string();

        let session_id = request
            .messages
            .last()
            .map(|m| m.session_id)
            .unwrap_or_else(Uuid::nil);

        Ok(ReasoningResponse {
            message: Message::text(session_id, Role::Ai, text),
            tools_used: vec![],
        })
    }
}
