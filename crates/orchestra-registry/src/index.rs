//! Brute-force cosine similarity vector index, keyed by block id.
//!
//! Adequate at the scale a single deployment's registry reaches (hundreds
//! to low thousands of blocks); a pluggable ANN backend could replace this
//! later behind the same `upsert`/`search` surface without touching
//! callers.

use crate::embedder::Embedding;

#[derive(Debug, Clone)]
struct IndexEntry {
    block_id: String,
    embedding: Embedding,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub block_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self { entries: Vec::new(), dimension }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn upsert(&mut self, block_id: impl Into<String>, embedding: Embedding) {
        let block_id = block_id.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.block_id == block_id) {
            entry.embedding = embedding;
        } else {
            self.entries.push(IndexEntry { block_id, embedding });
        }
    }

    pub fn remove(&mut self, block_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.block_id != block_id);
        self.entries.len() != before
    }

    /// `top_k` most similar entries to `query`, sorted by descending
    /// cosine similarity.
    pub fn search(&self, query: &Embedding, top_k: usize) -> Vec<SearchHit> {
        let query_norm = l2_norm(query);
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut scored: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|entry| SearchHit { block_id: entry.block_id.clone(), score: cosine_similarity(query, &entry.embedding, query_norm) })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    pub fn search_above(&self, query: &Embedding, top_k: usize, threshold: f32) -> Vec<SearchHit> {
        self.search(query, top_k).into_iter().filter(|h| h.score >= threshold).collect()
    }

    pub fn get(&self, block_id: &str) -> Option<&Embedding> {
        self.entries.iter().find(|e| e.block_id == block_id).map(|e| &e.embedding)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity(a: &[f32], b: &[f32], a_norm: f32) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let b_norm = l2_norm(b);
    if b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_and_search() {
        let mut idx = VectorIndex::new(4);
        idx.upsert("a", vec![1.0, 0.0, 0.0, 0.0]);
        idx.upsert("b", vec![0.0, 1.0, 0.0, 0.0]);
        idx.upsert("c", vec![0.9, 0.1, 0.0, 0.0]);

        let results = idx.search(&vec![1.0, 0.0, 0.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].block_id, "a");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert_eq!(results[1].block_id, "c");
    }

    #[test]
    fn upsert_replaces() {
        let mut idx = VectorIndex::new(2);
        idx.upsert("a", vec![1.0, 0.0]);
        idx.upsert("a", vec![0.0, 1.0]);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get("a").unwrap(), &vec![0.0, 1.0]);
    }

    #[test]
    fn remove_returns_whether_present() {
        let mut idx = VectorIndex::new(2);
        idx.upsert("a", vec![1.0, 0.0]);
        assert!(idx.remove("a"));
        assert!(idx.is_empty());
        assert!(!idx.remove("a"));
    }

    #[test]
    fn search_above_threshold_filters() {
        let mut idx = VectorIndex::new(4);
        idx.upsert("a", vec![1.0, 0.0, 0.0, 0.0]);
        idx.upsert("b", vec![0.0, 1.0, 0.0, 0.0]);

        let results = idx.search_above(&vec![1.0, 0.0, 0.0, 0.0], 10, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].block_id, "a");
    }

    #[test]
    fn zero_query_returns_nothing() {
        let mut idx = VectorIndex::new(2);
        idx.upsert("a", vec![1.0, 0.0]);
        assert!(idx.search(&vec![0.0, 0.0], 10).is_empty());
    }
}
