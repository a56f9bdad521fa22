//! Per-session vector index.
//!
//! An append-only store of embedded chunks with brute-force cosine
//! retrieval. Sessions are bounded by realistic per-user upload counts,
//! so a linear scan over all entries is the right trade: no index
//! structure to maintain, and ranking stays exact and deterministic.

/// One embedded, retrievable chunk of a bill's text.
///
/// Created at ingestion, never mutated, removed only when the owning
/// session is deleted.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    /// Position of the source bill in the session's bill sequence.
    pub bill_seq: usize,
    pub filename: String,
    pub text: String,
    /// Chunk offset within the source document.
    pub chunk_index: usize,
}

/// Append-only vector index scoped to one session.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// O(1) amortized append.
    pub fn insert(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = IndexEntry>) {
        self.entries.extend(entries);
    }

    /// Top-k entries by descending cosine similarity.
    ///
    /// Ties break by insertion order (earlier entries first, via stable
    /// sort). Returns an empty vec, not an error, on an empty index.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<(&IndexEntry, f32)> {
        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|e| (e, cosine_similarity(query_vec, &e.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity between two vectors; 0.0 on dimension mismatch or
/// zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vector: Vec<f32>, seq: usize, text: &str) -> IndexEntry {
        IndexEntry {
            vector,
            bill_seq: seq,
            filename: format!("bill-{}.pdf", seq),
            text: text.to_string(),
            chunk_index: 0,
        }
    }

    #[test]
    fn empty_index_returns_empty() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn search_never_exceeds_min_k_len() {
        let mut index = VectorIndex::new();
        index.insert(entry(vec![1.0, 0.0], 0, "a"));
        index.insert(entry(vec![0.0, 1.0], 1, "b"));
        assert_eq!(index.search(&[1.0, 0.0], 5).len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 1).len(), 1);
    }

    #[test]
    fn results_in_non_increasing_score_order() {
        let mut index = VectorIndex::new();
        index.insert(entry(vec![0.0, 1.0], 0, "orthogonal"));
        index.insert(entry(vec![1.0, 0.0], 1, "aligned"));
        index.insert(entry(vec![1.0, 1.0], 2, "diagonal"));

        let results = index.search(&[1.0, 0.0], 3);
        assert_eq!(results[0].0.text, "aligned");
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut index = VectorIndex::new();
        index.insert(entry(vec![1.0, 0.0], 0, "first"));
        index.insert(entry(vec![2.0, 0.0], 1, "second")); // same direction, same cosine

        let results = index.search(&[1.0, 0.0], 2);
        assert!((results[0].1 - results[1].1).abs() < 1e-6);
        assert_eq!(results[0].0.text, "first");
        assert_eq!(results[1].0.text, "second");
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, -0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
