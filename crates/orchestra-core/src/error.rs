use thiserror::Error;

/// The error taxonomy shared by every stage of the engine, from the
/// Clarifier down to a single block call. One stable variant per
/// user-visible failure mode; each carries enough context to build the
/// `{code, message, ...}` envelope at the HTTP boundary without ever
/// leaking a stack trace across it.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The Clarifier could not synthesize a usable intent (persistent empty input).
    #[error("could not clarify intent: {0}")]
    ClarifyError(String),

    /// Decompose produced invalid JSON or a structurally invalid plan after retry.
    #[error("decompose failed: {0}")]
    DecomposeError(String),

    /// Wire produced an invalid DAG (cycle, dangling reference, type mismatch) after retry.
    #[error("wire failed: {0}")]
    WireError(String),

    /// One or more required blocks could not be matched or synthesized.
    #[error("unresolved blocks: {unresolved:?}")]
    NoMatchAndNoSynthesis { unresolved: Vec<String> },

    /// A block's resolved inputs did not satisfy its `input_schema`.
    #[error("block '{block_id}' input error on field '{field}': {message}")]
    BlockInputError {
        block_id: String,
        field: String,
        message: String,
    },

    /// A block produced output that could not be parsed or did not validate.
    #[error("block '{block_id}' output error: {message}")]
    BlockOutputError {
        block_id: String,
        raw: String,
        message: String,
    },

    /// A block call exceeded its wall-clock timeout.
    #[error("block '{block_id}' timed out after {timeout_ms}ms")]
    BlockTimeoutError { block_id: String, timeout_ms: u64 },

    /// A block raised an uncaught failure during execution.
    #[error("block '{block_id}' runtime error: {message}")]
    BlockRuntimeError { block_id: String, message: String },

    /// The registry or memory store is unreachable.
    #[error("store unreachable: {0}")]
    StoreError(String),

    /// A template reference did not resolve (surfaced only when a block
    /// declares the missing field required; otherwise the resolver
    /// silently returns `null`/`""`).
    #[error("template reference '{{{{{namespace}.{path}}}}}' did not resolve")]
    TemplateRefError { namespace: String, path: String },

    /// A DAG load-time structural check failed (currently only cycles).
    #[error("cycle detected in pipeline graph")]
    CycleError,
}

impl EngineError {
    /// A short, stable machine-readable code for the API boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClarifyError(_) => "clarify_error",
            Self::DecomposeError(_) => "decompose_error",
            Self::WireError(_) => "wire_error",
            Self::NoMatchAndNoSynthesis { .. } => "no_match_and_no_synthesis",
            Self::BlockInputError { .. } => "block_input_error",
            Self::BlockOutputError { .. } => "block_output_error",
            Self::BlockTimeoutError { .. } => "block_timeout_error",
            Self::BlockRuntimeError { .. } => "block_runtime_error",
            Self::StoreError(_) => "store_error",
            Self::TemplateRefError { .. } => "template_ref_error",
            Self::CycleError => "cycle_error",
        }
    }

    /// The block or node id this error is about, if any.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Self::BlockInputError { block_id, .. }
            | Self::BlockOutputError { block_id, .. }
            | Self::BlockTimeoutError { block_id, .. }
            | Self::BlockRuntimeError { block_id, .. } => Some(block_id),
            _ => None,
        }
    }
}
