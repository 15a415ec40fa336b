//! Hybrid vector + lexical search over the registry.

use crate::embedder::{EmbedError, Embedder};
use crate::index::{SearchHit, VectorIndex};
use orchestra_core::BlockDefinition;
use std::collections::HashMap;
use std::sync::Arc;

/// A bounded bonus added to the cosine score for lexical matches, capped
/// so a lexical-only hit can never outrank a true semantic match.
const LEXICAL_BONUS_CAP: f32 = 0.15;

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub threshold: f32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), top_k: 10, threshold: 0.0 }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_threshold(mut self, t: f32) -> Self {
        self.threshold = t;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub block_id: String,
    pub score: f32,
}

/// Stateless combination of an embedder and a vector index; the registry
/// owns both and calls through this for every `search`.
pub struct SemanticSearch {
    embedder: Arc<dyn Embedder>,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embedder.embed(&[text])?.into_iter().next().ok_or_else(|| EmbedError::new("embedder returned no vectors"))
    }

    /// Combines vector cosine score with a lexical bonus over
    /// `id, name, description, tags`, normalizes to `[0, 1]`, and breaks
    /// ties by shorter id then lexical order.
    pub fn search(
        &self,
        query: &SearchQuery,
        index: &VectorIndex,
        blocks: &HashMap<String, BlockDefinition>,
    ) -> Result<Vec<SearchResult>, EmbedError> {
        let query_embedding = self.embed_query(&query.text)?;
        let query_lower = query.text.to_lowercase();

        let vector_hits: HashMap<String, f32> =
            index.search(&query_embedding, blocks.len().max(query.top_k)).into_iter().map(|h| (h.block_id, h.score)).collect();

        let mut scored: Vec<SearchResult> = blocks
            .keys()
            .map(|id| {
                let vector_score = vector_hits.get(id).copied().unwrap_or(0.0);
                let lexical_bonus = blocks.get(id).map(|b| lexical_bonus(&query_lower, b)).unwrap_or(0.0);
                let score = (vector_score + lexical_bonus).min(1.0);
                SearchResult { block_id: id.clone(), score }
            })
            .filter(|r| r.score >= query.threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.block_id.len().cmp(&b.block_id.len()))
                .then_with(|| a.block_id.cmp(&b.block_id))
        });
        scored.truncate(query.top_k);
        Ok(scored)
    }
}

fn lexical_bonus(query_lower: &str, block: &BlockDefinition) -> f32 {
    if query_lower.is_empty() {
        return 0.0;
    }

    let mut hits = 0u32;
    let mut check = |field: &str| {
        if field.to_lowercase().contains(query_lower) {
            hits += 1;
        }
    };

    check(&block.id);
    check(&block.name);
    check(&block.description);
    for tag in &block.tags {
        check(tag);
    }

    if hits == 0 {
        return 0.0;
    }
    (LEXICAL_BONUS_CAP * (hits as f32 / 4.0)).min(LEXICAL_BONUS_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::NoOpEmbedder;
    use orchestra_core::{BlockCategory, ExecutionKind, ObjectSchema};

    fn block(id: &str, name: &str, tags: &[&str]) -> BlockDefinition {
        BlockDefinition {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{name} description"),
            use_when: "when needed".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category: BlockCategory::Process,
            execution_kind: ExecutionKind::Llm,
            input_schema: ObjectSchema::default(),
            output_schema: ObjectSchema::default(),
            prompt_template: None,
            source: None,
            embedding: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn lexical_bonus_never_exceeds_cap() {
        let b = block("hn-fetch", "Hacker News Fetch", &["hn", "fetch"]);
        assert!(lexical_bonus("hn", &b) <= LEXICAL_BONUS_CAP);
    }

    #[test]
    fn search_falls_back_to_lexical_with_noop_embedder() {
        let embedder = Arc::new(NoOpEmbedder::new(4));
        let search = SemanticSearch::new(embedder);
        let mut index = VectorIndex::new(4);
        index.upsert("hn-fetch", vec![0.0; 4]);
        index.upsert("weather-fetch", vec![0.0; 4]);

        let mut blocks = HashMap::new();
        blocks.insert("hn-fetch".to_string(), block("hn-fetch", "Hacker News Fetch", &["hn"]));
        blocks.insert("weather-fetch".to_string(), block("weather-fetch", "Weather Fetch", &["weather"]));

        let results = search.search(&SearchQuery::new("hacker news"), &index, &blocks).unwrap();
        assert_eq!(results[0].block_id, "hn-fetch");
    }
}
