//! Retrieval engine: query embedding + index search + attribution.
//!
//! Deterministic given a deterministic embedding capability and the
//! index's stable insertion order.

use crate::embedding::{embed_query, Embedder};
use crate::error::{Error, Result};
use crate::models::SearchHit;
use crate::session::Session;

/// Retrieve the top-k chunks for a query, with originating-bill
/// attribution.
///
/// `k` must be positive; it is clamped to the number of indexed entries
/// rather than failing. An empty index yields an empty result without
/// calling the embedding capability.
pub async fn retrieve(
    session: &Session,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Err(Error::Validation("query must not be empty".to_string()));
    }
    if k == 0 {
        return Err(Error::Validation("top_k must be >= 1".to_string()));
    }

    // Cheap pre-check before the embedding round-trip.
    if session.read().await.index.is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embed_query(embedder, &session.api_key, query).await?;

    let state = session.read().await;
    let hits = state
        .index
        .search(&query_vec, k)
        .into_iter()
        .map(|(entry, score)| SearchHit {
            text: entry.text.clone(),
            filename: entry.filename.clone(),
            score,
        })
        .collect();
    Ok(hits)
}
