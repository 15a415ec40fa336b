use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::{BlockCategory, ExecutionKind};
use crate::schema::ObjectSchema;

/// A reusable, versioned unit of work. Blocks are owned by the registry
/// and immutable to callers once published — a "new version" is a new
/// `id` the caller chooses, not an in-place mutation of an old one's
/// semantics (the registry itself performs in-place CAS updates of the
/// same `id`; see [`crate::error::EngineError`] and the registry crate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// Unique, snake_case identifier. Stable for the lifetime of the store.
    pub id: String,
    pub name: String,
    pub description: String,
    /// When this block is the right tool — feeds both the LLM synthesis
    /// prompt and the embedding that Search matches against.
    pub use_when: String,
    pub tags: HashSet<String>,
    pub category: BlockCategory,
    pub execution_kind: ExecutionKind,
    pub input_schema: ObjectSchema,
    pub output_schema: ObjectSchema,
    /// Populated when `execution_kind == Llm`: a prompt template with
    /// `{placeholder}` slots matching `input_schema` field names.
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Populated when `execution_kind == Code`: source text in the
    /// sandboxed target language, defining an `entrypoint(inputs, context)`.
    #[serde(default)]
    pub source: Option<String>,
    /// Assigned by the registry on save, from `description + use_when + tags`.
    /// Never derived from the schemas.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl BlockDefinition {
    /// The text the registry embeds. Deliberately excludes the schemas —
    /// matching on implementation shape would bias search toward blocks
    /// that happen to share field names rather than ones that do the
    /// right thing.
    pub fn semantic_text(&self) -> String {
        let mut tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        tags.sort_unstable();
        format!("{} {} {}", self.description, self.use_when, tags.join(" "))
    }

    /// A cheap signature over the fields that, when changed, force an
    /// embedding rebuild and gate CAS `save`. Not a cryptographic hash —
    /// collisions are acceptable since it only protects against
    /// lost-update races on the same `id`, not against adversaries.
    pub fn semantic_signature(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.semantic_text().hash(&mut hasher);
        hasher.finish()
    }
}
