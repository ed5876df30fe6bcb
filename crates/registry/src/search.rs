//! Keyword scoring and the semantic-search collaborator seam.

use async_trait::async_trait;
use serde_json::Value;

use a2e_error::Result;

/// A search hit with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredHit {
    /// Payload stored at indexing time (metadata only, never secrets).
    pub payload: Value,
    pub score: f64,
}

/// External semantic-search service.
///
/// The registry and the credential vault index metadata into this
/// collaborator and delegate searches to it. Implementations are optional;
/// every caller falls back to [`keyword_score`] ranking when no index is
/// attached or a call fails.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Index a document. `kind` partitions the space (`"api"`, `"sql"`,
    /// `"credential"`); `text` is what gets embedded; `payload` is returned
    /// verbatim from searches.
    async fn index(&self, kind: &str, id: &str, text: &str, payload: Value) -> Result<()>;

    /// Search within one document kind.
    async fn search(&self, text: &str, kind: Option<&str>, top_k: usize)
        -> Result<Vec<ScoredHit>>;
}

/// Deterministic keyword score: for every whitespace-separated query word,
/// each `(text, weight)` field containing the word (case-insensitive)
/// contributes its weight. Zero means no match.
pub fn keyword_score(query: &str, fields: &[(&str, u32)]) -> u32 {
    let mut score = 0;
    for word in query.to_lowercase().split_whitespace() {
        for (text, weight) in fields {
            if text.to_lowercase().contains(word) {
                score += weight;
            }
        }
    }
    score
}

/// Order scored candidates by descending score, breaking ties by ascending
/// id, and keep the top `k`. Zero-score candidates are dropped.
pub fn rank<T>(mut candidates: Vec<(u32, String, T)>, k: usize) -> Vec<(u32, T)> {
    candidates.retain(|(score, _, _)| *score > 0);
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    candidates
        .into_iter()
        .take(k)
        .map(|(score, _, item)| (score, item))
        .collect()
}
