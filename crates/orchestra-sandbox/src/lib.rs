//! Module-whitelisted WebAssembly sandbox for `code`-kind block execution.
//!
//! A `code` block's `source` is a WebAssembly module compiled ahead of
//! time by its author. The host never links anything beyond the fixed
//! capability set in [`host::CAPABILITY_NAMES`] — no filesystem, no
//! process spawning, no arbitrary network access. A module that imports
//! a host function outside the whitelist fails at instantiation, not at
//! some later point mid-run.
//!
//! This plays the role `fissio-tools`'s `ToolRegistry` played for LLM
//! function calling: a fixed, named surface a block author can reach
//! for. Here the surface is host functions callable from inside a wasm
//! guest rather than tools callable by an LLM.
//!
//! Guest ABI: the module exports `memory`, `alloc(len: u32) -> u32`, and
//! `entrypoint(inputs_ptr, inputs_len, context_ptr, context_len) -> (u32,
//! u32)` (output ptr, output len). `inputs`/`context` and the returned
//! value are all JSON encoded. Host capabilities under `env` follow the
//! same ptr/len convention, calling back into the guest's own `alloc`
//! to place their results.

mod host;

use std::time::Duration;

use orchestra_core::EngineError;
use serde_json::Value;
use wasmtime::{Config, Engine, Linker, Module, Store};

pub use host::CAPABILITY_NAMES;

#[derive(thiserror::Error, Debug)]
pub enum SandboxError {
    #[error("module failed to compile: {0}")]
    Compile(String),
    #[error("module failed to instantiate: {0}")]
    Instantiate(String),
    #[error("execution trapped: {0}")]
    Trap(String),
    #[error("entrypoint returned invalid output: {0}")]
    InvalidOutput(String),
}

impl SandboxError {
    /// Maps into the shared error taxonomy for a specific block run.
    pub fn into_engine_error(self, block_id: &str, timed_out: bool, timeout_ms: u64) -> EngineError {
        if timed_out {
            return EngineError::BlockTimeoutError { block_id: block_id.to_string(), timeout_ms };
        }
        EngineError::BlockRuntimeError { block_id: block_id.to_string(), message: self.to_string() }
    }
}

/// Per-execution state available to host functions via `Caller::data()`.
pub struct SandboxState {
    pub http: reqwest::Client,
}

/// Owns the wasmtime [`Engine`] shared by every sandboxed execution.
/// Cheap to clone the underlying engine handle; expensive to construct,
/// so callers should hold one `Sandbox` for the process lifetime.
pub struct Sandbox {
    engine: Engine,
    http: reqwest::Client,
}

impl Sandbox {
    pub fn new() -> Result<Self, SandboxError> {
        let mut config = Config::new();
        config.async_support(true);
        config.epoch_interruption(true);
        let engine = Engine::new(&config).map_err(|e| SandboxError::Compile(e.to_string()))?;
        Ok(Self { engine, http: reqwest::Client::new() })
    }

    /// Save-time validation: the `source` on a `code` block must at
    /// least compile under this engine's configuration before it is
    /// accepted into the registry.
    pub fn compile_check(&self, source: &[u8]) -> Result<(), SandboxError> {
        Module::new(&self.engine, source).map(|_| ()).map_err(|e| SandboxError::Compile(e.to_string()))
    }

    /// Runs `entrypoint(inputs, context)` to completion or until
    /// `timeout` elapses, whichever comes first. A timeout manifests as
    /// a trap from the wasmtime epoch deadline, which the caller maps to
    /// [`EngineError::BlockTimeoutError`].
    pub async fn execute(&self, source: &[u8], inputs: Value, context: Value, timeout: Duration) -> Result<Value, SandboxError> {
        let module = Module::new(&self.engine, source).map_err(|e| SandboxError::Compile(e.to_string()))?;

        let state = SandboxState { http: self.http.clone() };
        let mut store = Store::new(&self.engine, state);
        store.set_epoch_deadline(1);

        let mut linker: Linker<SandboxState> = Linker::new(&self.engine);
        host::link_capabilities(&mut linker).map_err(|e| SandboxError::Instantiate(e.to_string()))?;

        let engine_handle = self.engine.clone();
        let ticker = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            engine_handle.increment_epoch();
        });

        let outcome = run_entrypoint(&linker, &mut store, &module, inputs, context).await;
        ticker.abort();
        outcome
    }
}

async fn run_entrypoint(
    linker: &Linker<SandboxState>,
    store: &mut Store<SandboxState>,
    module: &Module,
    inputs: Value,
    context: Value,
) -> Result<Value, SandboxError> {
    let instance =
        linker.instantiate_async(&mut *store, module).await.map_err(|e| SandboxError::Instantiate(e.to_string()))?;

    let memory = instance.get_memory(&mut *store, "memory").ok_or_else(|| {
        SandboxError::Instantiate("module does not export `memory`".to_string())
    })?;
    let alloc = instance
        .get_typed_func::<u32, u32>(&mut *store, "alloc")
        .map_err(|e| SandboxError::Instantiate(e.to_string()))?;
    let entrypoint = instance
        .get_typed_func::<(u32, u32, u32, u32), (u32, u32)>(&mut *store, "entrypoint")
        .map_err(|e| SandboxError::Instantiate(e.to_string()))?;

    let (inputs_ptr, inputs_len) = write_json(&mut *store, &alloc, &memory, &inputs).await?;
    let (context_ptr, context_len) = write_json(&mut *store, &alloc, &memory, &context).await?;

    let (out_ptr, out_len) = entrypoint
        .call_async(&mut *store, (inputs_ptr, inputs_len, context_ptr, context_len))
        .await
        .map_err(|e| SandboxError::Trap(e.to_string()))?;

    let bytes = memory
        .data(&*store)
        .get(out_ptr as usize..(out_ptr as usize + out_len as usize))
        .ok_or_else(|| SandboxError::InvalidOutput("output pointer out of bounds".to_string()))?
        .to_vec();

    serde_json::from_slice(&bytes).map_err(|e| SandboxError::InvalidOutput(e.to_string()))
}

async fn write_json(
    store: &mut Store<SandboxState>,
    alloc: &wasmtime::TypedFunc<u32, u32>,
    memory: &wasmtime::Memory,
    value: &Value,
) -> Result<(u32, u32), SandboxError> {
    let bytes = serde_json::to_vec(value).map_err(|e| SandboxError::InvalidOutput(e.to_string()))?;
    let ptr = alloc.call_async(&mut *store, bytes.len() as u32).await.map_err(|e| SandboxError::Instantiate(e.to_string()))?;
    memory.write(&mut *store, ptr as usize, &bytes).map_err(|e| SandboxError::Instantiate(e.to_string()))?;
    Ok((ptr, bytes.len() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_whitelist_is_fixed() {
        assert_eq!(CAPABILITY_NAMES.len(), 7);
        assert!(CAPABILITY_NAMES.contains(&"http_fetch"));
    }
}
