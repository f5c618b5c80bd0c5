use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use braid_core::{BraidError, IdentityId, Result};
use braid_llm::EmbeddingProvider;

use crate::graph::RelationshipGraph;
use crate::model::MemoryItem;
use crate::store::{MemoryStore, l2_normalize};

/// Scoring knobs for retrieval.
///
/// The defaults score by cosine similarity alone. `alpha < 1.0` blends in
/// keyword overlap between the query and the item text, and `time_weighting`
/// multiplies by a recency factor with the given half-life — both
/// deterministic, so ranking stays reproducible for a fixed pool and query.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Default number of items to return when the caller has no preference.
    pub k: usize,
    /// Items scoring below this are dropped; if nothing passes, fall back to
    /// the plain top-k so a strict threshold never silences retrieval.
    pub min_score: Option<f32>,
    /// Weight of cosine similarity vs. keyword overlap (1.0 = pure cosine).
    pub alpha: f32,
    /// Multiply scores by `0.85 + 0.15 * decay` favoring recent items.
    pub time_weighting: bool,
    /// Half-life of the recency decay, in days.
    pub half_life_days: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 4,
            min_score: None,
            alpha: 1.0,
            time_weighting: false,
            half_life_days: 14.0,
        }
    }
}

/// Relevance-ranked selection over an identity's own memory plus the memory
/// of every identity that authorized them.
///
/// Read-only: retrieval never appends to any store.
pub struct RetrievalEngine {
    store: Arc<MemoryStore>,
    graph: RelationshipGraph,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<MemoryStore>, config: RetrievalConfig) -> Self {
        let graph = RelationshipGraph::new(&store);
        let embedder = store.embedder();
        Self {
            store,
            graph,
            embedder,
            config,
        }
    }

    /// The configured default `k`.
    pub fn default_k(&self) -> usize {
        self.config.k
    }

    /// Return the top `k` memory items relevant to `query`, best first.
    ///
    /// The candidate pool is the requester's items plus the items of every
    /// identity in their `amplify_from` set; each owner's pool is loaded once
    /// per call. Ties break toward newer items (then higher position), so the
    /// ordering is total and reproducible.
    pub async fn retrieve(
        &self,
        requesting_id: IdentityId,
        query: &str,
        k: usize,
    ) -> Result<Vec<(MemoryItem, f32)>> {
        if query.trim().is_empty() {
            return Err(BraidError::Validation("empty retrieval query".into()));
        }
        if k == 0 {
            return Ok(vec![]);
        }

        let peers = self.graph.get_relationships(requesting_id)?.amplify_from;

        let mut query_vec = {
            let mut vectors = self.embedder.embed(&[query]).await?;
            if vectors.is_empty() {
                return Err(BraidError::Provider("embedder returned no vector".into()));
            }
            vectors.remove(0)
        };
        l2_normalize(&mut query_vec);

        let mut pool: Vec<MemoryItem> = self.store.load_all(requesting_id)?;
        for peer in &peers {
            pool.extend(self.store.load_all(*peer)?);
        }
        if pool.is_empty() {
            debug!(%requesting_id, "retrieval pool empty");
            return Ok(vec![]);
        }

        let now = Utc::now();
        let mut scored: Vec<(MemoryItem, f32)> = pool
            .into_iter()
            .map(|item| {
                let cos = cosine_similarity(&query_vec, &item.embedding);
                let mut score = if self.config.alpha >= 1.0 {
                    cos
                } else {
                    self.config.alpha * cos
                        + (1.0 - self.config.alpha) * keyword_overlap(query, &item.text)
                };
                if self.config.time_weighting {
                    let age_secs = (now - item.created_at).num_seconds().max(0) as f32;
                    let days = age_secs / 86_400.0;
                    let decay = 0.5f32.powf(days / self.config.half_life_days.max(1e-6));
                    score *= 0.85 + 0.15 * decay;
                }
                (item, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
                .then_with(|| b.0.position.cmp(&a.0.position))
        });

        let hits: Vec<(MemoryItem, f32)> = match self.config.min_score {
            Some(min) => {
                let passing: Vec<_> = scored
                    .iter()
                    .filter(|(_, s)| *s >= min)
                    .take(k)
                    .cloned()
                    .collect();
                if passing.is_empty() {
                    scored.into_iter().take(k).collect()
                } else {
                    passing
                }
            }
            None => scored.into_iter().take(k).collect(),
        };

        debug!(
            %requesting_id,
            peers = peers.len(),
            returned = hits.len(),
            "retrieval complete"
        );
        Ok(hits)
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Token-set overlap between two texts: intersection size over the geometric
/// mean of the token counts. Range [0, 1].
fn keyword_overlap(a: &str, b: &str) -> f32 {
    let tokens = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    };
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count() as f32;
    inter / ((ta.len() as f32) * (tb.len() as f32)).sqrt()
}
