//! Mock providers for deterministic testing.
//!
//! No HTTP: embeddings come from token hashing, replies from a queue.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use braid_core::{BraidError, Message, Result, Role};

use crate::provider::{EmbeddingProvider, ReasoningProvider, ReasoningRequest, ReasoningResponse};

/// Deterministic embedding provider: hashes each token into a fixed-dimension
/// bag-of-words vector and L2-normalizes it. Texts sharing words score a high
/// cosine similarity, so retrieval ranking is meaningful in tests.
pub struct MockEmbedding {
    dims: usize,
    /// If set, every call fails with this error (for failure-path tests).
    fail_with: Option<String>,
}

impl MockEmbedding {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            fail_with: None,
        }
    }

    /// Make every `embed` call fail with a provider error.
    pub fn failing(message: &str) -> Self {
        Self {
            dims: 32,
            fail_with: Some(message.to_string()),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dims;
            v[bucket] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if let Some(msg) = &self.fail_with {
            return Err(BraidError::Provider(msg.clone()));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A pre-configured reply from the mock reasoner.
#[derive(Clone)]
pub struct MockReply {
    pub text: String,
    pub tools_used: Vec<String>,
    /// If set, the provider returns this error instead.
    pub error: Option<String>,
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tools_used: vec![],
            error: None,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            text: String::new(),
            tools_used: vec![],
            error: Some(msg.to_string()),
        }
    }
}

/// A mock reasoning backend that returns queued replies in order.
pub struct MockReasoner {
    replies: Arc<Mutex<Vec<MockReply>>>,
    /// Track all requests received (for assertions in tests).
    pub requests: Arc<Mutex<Vec<ReasoningRequest>>>,
}

impl MockReasoner {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(vec![])),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Queue a simple text reply.
    pub fn with_reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push(MockReply::text(text));
        self
    }

    /// Queue an error.
    pub fn with_error(self, error: &str) -> Self {
        self.replies.lock().unwrap().push(MockReply::error(error));
        self
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<ReasoningRequest>>> {
        Arc::clone(&self.requests)
    }

    fn next_reply(&self) -> MockReply {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            MockReply::text("(mock: no more queued replies)")
        } else {
            replies.remove(0)
        }
    }
}

impl Default for MockReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningProvider for MockReasoner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn respond(&self, request: &ReasoningRequest) -> Result<ReasoningResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.next_reply();

        if let Some(error) = reply.error {
            return Err(BraidError::Reasoning(error));
        }

        let session_id = request
            .messages
            .last()
            .map(|m| m.session_id)
            .unwrap_or_else(Uuid::nil);

        Ok(ReasoningResponse {
            message: Message::text(session_id, Role::Ai, reply.text),
            tools_used: reply.tools_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_mock_embedding_deterministic() {
        let embedder = MockEmbedding::new(32);
        let a = embedder.embed(&["allergic to peanuts"]).await.unwrap();
        let b = embedder.embed(&["allergic to peanuts"]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_embedding_similarity_ranks_overlap() {
        let embedder = MockEmbedding::new(64);
        let vecs = embedder
            .embed(&[
                "dinner with peanuts",
                "allergic to peanuts at dinner",
                "quarterly tax filing",
            ])
            .await
            .unwrap();
        let query = &vecs[0];
        assert!(cosine(query, &vecs[1]) > cosine(query, &vecs[2]));
    }

    #[tokio::test]
    async fn test_mock_embedding_failure() {
        let embedder = MockEmbedding::failing("quota exceeded");
        let err = embedder.embed(&["anything"]).await.unwrap_err();
        assert!(matches!(err, BraidError::Provider(_)));
    }

    #[tokio::test]
    async fn test_mock_reasoner_replies_in_order() {
        let reasoner = MockReasoner::new().with_reply("first").with_reply("second");
        let req = ReasoningRequest {
            model: "test".into(),
            messages: vec![],
            max_tokens: 100,
            temperature: 0.7,
        };
        let r1 = reasoner.respond(&req).await.unwrap();
        let r2 = reasoner.respond(&req).await.unwrap();
        assert_eq!(r1.message.text_content(), "first");
        assert_eq!(r2.message.text_content(), "second");
    }

    #[tokio::test]
    async fn test_mock_reasoner_error_and_recording() {
        let reasoner = MockReasoner::new().with_error("overloaded");
        let req = ReasoningRequest {
            model: "test".into(),
            messages: vec![Message::text(Uuid::new_v4(), Role::Human, "hi")],
            max_tokens: 100,
            temperature: 0.7,
        };
        let err = reasoner.respond(&req).await.unwrap_err();
        assert!(matches!(err, BraidError::Reasoning(_)));
        let recorded = reasoner.recorded_requests();
        assert_eq!(recorded.lock().unwrap().len(), 1);
    }
}
