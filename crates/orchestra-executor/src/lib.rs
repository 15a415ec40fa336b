//! Template resolution and block execution.
//!
//! [`template::resolve`] is pure — no I/O, no registry, no store — and
//! runs ahead of [`executor::execute`], which is where the one real
//! side effect lives: exactly one LLM call or one sandboxed wasm call
//! per block.

mod executor;
mod template;

pub use executor::{execute, ExecutionContext};
pub use template::{resolve, RunStateView};
