//! Block registry: storage, CAS updates, and hybrid vector/lexical search
//! over [`BlockDefinition`]s.
//!
//! Grounded on `vibe-graph-semantic`'s split between an [`Embedder`]
//! backend, a brute-force [`VectorIndex`], and a stateless
//! [`SemanticSearch`] layered on top — adapted from node-id-keyed
//! indexing to block-id-keyed.

mod embedder;
mod index;
mod search;

pub use embedder::{EmbedError, Embedder, Embedding, NoOpEmbedder};
#[cfg(feature = "fastembed")]
pub use embedder::FastEmbedBackend;
pub use index::{SearchHit, VectorIndex};
pub use search::{SearchQuery, SearchResult, SemanticSearch};

use std::collections::HashMap;
use std::sync::Arc;

use orchestra_core::BlockDefinition;
use orchestra_llm::UnifiedLlmClient;
use tokio::sync::RwLock;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("block not found: {0}")]
    NotFound(String),
    #[error("save conflict: {id} was modified concurrently since it was read")]
    Conflict { id: String },
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Deployment-wide default applied to [`SearchQuery::threshold`] when a
/// caller omits one.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.55;

struct RegistryState {
    blocks: HashMap<String, BlockDefinition>,
    index: VectorIndex,
}

/// Owns block storage and the search index behind a single `RwLock`, so
/// every `save` both mutates the map and rebuilds the index entry
/// atomically with respect to readers.
pub struct BlockRegistry {
    state: RwLock<RegistryState>,
    embedder: Arc<dyn Embedder>,
    search: SemanticSearch,
}

impl BlockRegistry {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let dim = embedder.dimension();
        Self {
            state: RwLock::new(RegistryState { blocks: HashMap::new(), index: VectorIndex::new(dim) }),
            search: SemanticSearch::new(embedder.clone()),
            embedder,
        }
    }

    /// Loads an already-embedded block definition without re-deriving its
    /// embedding. Used when hydrating the registry from persistent
    /// storage at startup.
    pub async fn hydrate(&self, block: BlockDefinition) {
        let mut state = self.state.write().await;
        if let Some(embedding) = block.embedding.clone() {
            state.index.upsert(block.id.clone(), embedding);
        }
        state.blocks.insert(block.id.clone(), block);
    }

    pub async fn get(&self, id: &str) -> Option<BlockDefinition> {
        self.state.read().await.blocks.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<BlockDefinition> {
        self.state.read().await.blocks.values().cloned().collect()
    }

    /// Inserts or replaces `block`. `expected_signature` must match the
    /// stored block's `semantic_signature()` (or be `None` for a
    /// brand-new id); otherwise this is a lost-update race and the save
    /// is rejected rather than silently overwritten.
    pub async fn save(&self, mut block: BlockDefinition, expected_signature: Option<u64>) -> Result<BlockDefinition, RegistryError> {
        let mut state = self.state.write().await;

        let current_signature = state.blocks.get(&block.id).map(BlockDefinition::semantic_signature);
        if current_signature != expected_signature {
            return Err(RegistryError::Conflict { id: block.id.clone() });
        }

        if current_signature.is_none() || current_signature != Some(block.semantic_signature()) {
            let embedding = self.embedder.embed(&[&block.semantic_text()])?.into_iter().next().unwrap_or_default();
            block.embedding = Some(embedding.clone());
            state.index.upsert(block.id.clone(), embedding);
        }

        let id = block.id.clone();
        state.blocks.insert(id, block.clone());
        Ok(block)
    }

    pub async fn remove(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        state.index.remove(id);
        state.blocks.remove(id).is_some()
    }

    /// Embeds a raw query string. Exposed separately from `search` so
    /// callers (e.g. the Thinker's Search stage) can embed a rewritten
    /// query without re-deriving it per candidate.
    pub fn embed_query(&self, text: &str) -> Result<Embedding, EmbedError> {
        self.search.embed_query(text)
    }

    /// Rewrites a raw "required block" description into a short
    /// capability-shaped query before embedding, using the schema hint to
    /// bias toward blocks with compatible input/output shape. Falls back
    /// to the raw description if the rewrite call fails — a worse query
    /// embedding is better than a missing one.
    pub async fn rewrite_query(&self, llm: &UnifiedLlmClient, description: &str, schema_hint: &str) -> String {
        let system = "Rewrite the following capability description as a short phrase naming what it does, \
                       in the style of a catalog entry. Return only the phrase.";
        let user = format!("Description: {description}\nExpected shape: {schema_hint}");
        match llm.chat(system, &user).await {
            Ok(response) => response.content.trim().to_string(),
            Err(_) => description.to_string(),
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, RegistryError> {
        let state = self.state.read().await;
        Ok(self.search.search(query, &state.index, &state.blocks)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::{BlockCategory, ExecutionKind, ObjectSchema};

    fn sample(id: &str) -> BlockDefinition {
        BlockDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: "fetches the top stories from hacker news".into(),
            use_when: "when the user wants recent hacker news posts".into(),
            tags: ["hn", "fetch", "news"].into_iter().map(String::from).collect(),
            category: BlockCategory::Input,
            execution_kind: ExecutionKind::Code,
            input_schema: ObjectSchema::default(),
            output_schema: ObjectSchema::default(),
            prompt_template: None,
            source: Some("(module)".into()),
            embedding: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let registry = BlockRegistry::new(Arc::new(NoOpEmbedder::new(4)));
        let saved = registry.save(sample("hn-fetch"), None).await.unwrap();
        assert!(saved.embedding.is_some());
        let fetched = registry.get("hn-fetch").await.unwrap();
        assert_eq!(fetched.id, "hn-fetch");
    }

    #[tokio::test]
    async fn save_rejects_stale_signature() {
        let registry = BlockRegistry::new(Arc::new(NoOpEmbedder::new(4)));
        registry.save(sample("hn-fetch"), None).await.unwrap();

        let result = registry.save(sample("hn-fetch"), Some(0)).await;
        assert!(matches!(result, Err(RegistryError::Conflict { .. })));
    }

    #[tokio::test]
    async fn search_finds_lexically_matching_block() {
        let registry = BlockRegistry::new(Arc::new(NoOpEmbedder::new(4)));
        registry.save(sample("hn-fetch"), None).await.unwrap();
        registry.save(sample("weather-fetch"), None).await.unwrap();

        let results = registry.search(&SearchQuery::new("hacker news")).await.unwrap();
        assert_eq!(results[0].block_id, "hn-fetch");
    }
}
