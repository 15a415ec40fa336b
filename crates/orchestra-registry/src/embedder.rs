//! Embedding backend trait and implementations.
//!
//! [`Embedder`] abstracts over the inference engine so the registry never
//! couples to a specific model runtime. `fastembed` is the only real
//! backend today, feature-gated because it pulls in ONNX runtime bindings;
//! [`NoOpEmbedder`] keeps the registry usable (lexical-only) without them.

use std::fmt;

pub type Embedding = Vec<f32>;

#[derive(Debug)]
pub struct EmbedError {
    pub message: String,
}

impl EmbedError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "embed: {}", self.message)
    }
}

impl std::error::Error for EmbedError {}

/// Portable embedding contract; native and (eventually) WASM backends both
/// implement it.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Zero-vector embedder. Deterministic, always available, makes `search`
/// degrade to lexical-only matching rather than fail when no real
/// embedding backend is configured.
#[derive(Debug, Default, Clone)]
pub struct NoOpEmbedder {
    dim: usize,
}

impl NoOpEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for NoOpEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError> {
        Ok(texts.iter().map(|_| vec![0.0; self.dim]).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "noop"
    }
}

#[cfg(feature = "fastembed")]
pub use self::fastembed_backend::FastEmbedBackend;

#[cfg(feature = "fastembed")]
mod fastembed_backend {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Wraps `fastembed::TextEmbedding` behind [`Embedder`]. `embed` takes
    /// `&mut self` on the underlying model, so interior mutability via
    /// `Mutex` is what lets the trait stay `&self` (needed for
    /// `Arc<dyn Embedder>` shared across registry clones).
    pub struct FastEmbedBackend {
        model: Mutex<TextEmbedding>,
        model_name: String,
        dim: usize,
    }

    pub const ENV_MODEL: &str = "ORCHESTRA_EMBED_MODEL";

    impl FastEmbedBackend {
        pub fn default_model(cache_dir: Option<PathBuf>) -> Result<Self, EmbedError> {
            Self::with_model(EmbeddingModel::BGESmallENV15, cache_dir)
        }

        pub fn from_env(cache_dir: Option<PathBuf>) -> Result<Self, EmbedError> {
            match std::env::var(ENV_MODEL) {
                Ok(val) if !val.is_empty() => {
                    let model_id: EmbeddingModel = val
                        .parse()
                        .map_err(|e: String| EmbedError::new(format!("{e}. set {ENV_MODEL} to a supported model code")))?;
                    Self::with_model(model_id, cache_dir)
                }
                _ => Self::default_model(cache_dir),
            }
        }

        pub fn with_model(model_id: EmbeddingModel, cache_dir: Option<PathBuf>) -> Result<Self, EmbedError> {
            let info = TextEmbedding::list_supported_models().into_iter().find(|m| m.model == model_id);
            let dim = info.as_ref().map(|m| m.dim).unwrap_or(384);
            let name = info.as_ref().map(|m| m.model_code.clone()).unwrap_or_else(|| "unknown".to_string());

            let mut opts = InitOptions::new(model_id).with_show_download_progress(true);
            if let Some(dir) = cache_dir {
                opts = opts.with_cache_dir(dir);
            }

            let model = TextEmbedding::try_new(opts).map_err(|e| EmbedError::new(format!("fastembed init: {e}")))?;
            Ok(Self { model: Mutex::new(model), model_name: name, dim })
        }
    }

    impl Embedder for FastEmbedBackend {
        fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError> {
            let owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
            let mut model = self.model.lock().map_err(|e| EmbedError::new(format!("fastembed lock poisoned: {e}")))?;
            model.embed(owned, None).map_err(|e| EmbedError::new(format!("fastembed embed: {e}")))
        }

        fn dimension(&self) -> usize {
            self.dim
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }
}
