//! Fuzzy semantic-similarity collaborator (optional, external).
//!
//! The fuzzy tier is the only suspension point in the whole engine: an
//! awaitable, batched call with a bounded per-batch timeout. Absence,
//! timeout, or failure degrades the affected comparison to `NONE`; it never
//! aborts the batch or the run. Results are cached keyed by the normalized
//! descriptor pair so identical comparisons are never re-issued within or
//! across runs.

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One comparison request: two short constraint descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorPair {
    pub spec: String,
    pub code: String,
}

/// Similarity response: a score in [0, 1] plus an optional explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Interface for similarity collaborators. Must support batched requests.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Score each pair; the result vector must be positionally aligned with
    /// the request slice.
    async fn score_batch(&self, pairs: &[DescriptorPair]) -> anyhow::Result<Vec<SimilarityScore>>;

    /// Provider name for logs and rationales.
    fn name(&self) -> &'static str {
        "similarity"
    }
}

// ============================================================================
// Result cache
// ============================================================================

/// Cache of similarity scores keyed by the normalized descriptor pair.
/// Shared across batches within a run; persistable across runs via the
/// report container.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    entries: RwLock<AHashMap<(String, String), f64>>,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(pair: &DescriptorPair) -> (String, String) {
        (
            pair.spec.trim().to_ascii_lowercase(),
            pair.code.trim().to_ascii_lowercase(),
        )
    }

    pub fn get(&self, pair: &DescriptorPair) -> Option<f64> {
        self.entries.read().get(&Self::key(pair)).copied()
    }

    pub fn put(&self, pair: &DescriptorPair, score: f64) {
        self.entries.write().insert(Self::key(pair), score);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deterministic snapshot for persistence (sorted by key).
    pub fn snapshot(&self) -> Vec<((String, String), f64)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn restore(&self, entries: Vec<((String, String), f64)>) {
        let mut guard = self.entries.write();
        for (key, score) in entries {
            guard.insert(key, score);
        }
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Deterministic token-overlap provider. Used in tests and as the local
/// fallback when no external collaborator is configured; cheap enough that
/// batching and caching still go through the same code path as real
/// providers.
#[derive(Debug, Default)]
pub struct StubSimilarityProvider;

impl StubSimilarityProvider {
    pub fn new() -> Self {
        Self
    }

    fn tokens(text: &str) -> HashSet<String> {
        text.to_ascii_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
            .map(String::from)
            .collect()
    }

    fn jaccard(a: &str, b: &str) -> f64 {
        let ta = Self::tokens(a);
        let tb = Self::tokens(b);
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }
        let intersection = ta.intersection(&tb).count() as f64;
        let union = ta.union(&tb).count() as f64;
        intersection / union
    }
}

#[async_trait]
impl SimilarityProvider for StubSimilarityProvider {
    async fn score_batch(&self, pairs: &[DescriptorPair]) -> anyhow::Result<Vec<SimilarityScore>> {
        Ok(pairs
            .iter()
            .map(|p| SimilarityScore {
                score: Self::jaccard(&p.spec, &p.code),
                explanation: None,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "token-overlap"
    }
}

/// HTTP-backed similarity provider.
#[cfg(feature = "http-similarity")]
pub struct HttpSimilarityProvider {
    pub endpoint: String,
    client: reqwest::Client,
}

#[cfg(feature = "http-similarity")]
impl HttpSimilarityProvider {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "http-similarity")]
#[async_trait]
impl SimilarityProvider for HttpSimilarityProvider {
    async fn score_batch(&self, pairs: &[DescriptorPair]) -> anyhow::Result<Vec<SimilarityScore>> {
        #[derive(Serialize)]
        struct Request<'a> {
            pairs: &'a [DescriptorPair],
        }

        #[derive(Deserialize)]
        struct Response {
            scores: Vec<SimilarityScore>,
        }

        let response: Response = self
            .client
            .post(&self.endpoint)
            .json(&Request { pairs })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.scores.len() != pairs.len() {
            anyhow::bail!(
                "similarity endpoint returned {} scores for {} pairs",
                response.scores.len(),
                pairs.len()
            );
        }
        Ok(response.scores)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
