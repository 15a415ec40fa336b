//! Persistence seam the Doer calls through for user memory and run logs.
//! `orchestra-server` provides the `rusqlite`-backed implementation;
//! tests use an in-memory one.

use async_trait::async_trait;
use orchestra_core::{EngineError, RunState};
use serde_json::{Map, Value};

#[async_trait]
pub trait DoerStore: Send + Sync {
    /// Loads the user profile a run's templates address as `{{user...}}`.
    /// Runs, not callers, own this lookup — `user_id` is the only
    /// caller-supplied identity a run needs.
    async fn load_user(&self, user_id: &str) -> Result<Value, EngineError>;
    async fn load_memory(&self, user_id: &str) -> Result<Map<String, Value>, EngineError>;
    async fn save_memory(&self, user_id: &str, memory: &Map<String, Value>) -> Result<(), EngineError>;
    async fn persist_run(&self, state: &RunState) -> Result<(), EngineError>;
}

/// In-process store for tests and for running the engine without a
/// configured database.
#[derive(Default)]
pub struct InMemoryStore {
    users: tokio::sync::RwLock<std::collections::HashMap<String, Value>>,
    memory: tokio::sync::RwLock<std::collections::HashMap<String, Map<String, Value>>>,
}

impl InMemoryStore {
    /// Seeds a user profile, for tests that exercise `{{user...}}` templates.
    pub async fn set_user(&self, user_id: &str, user: Value) {
        self.users.write().await.insert(user_id.to_string(), user);
    }
}

#[async_trait]
impl DoerStore for InMemoryStore {
    async fn load_user(&self, user_id: &str) -> Result<Value, EngineError> {
        Ok(self.users.read().await.get(user_id).cloned().unwrap_or(Value::Null))
    }

    async fn load_memory(&self, user_id: &str) -> Result<Map<String, Value>, EngineError> {
        Ok(self.memory.read().await.get(user_id).cloned().unwrap_or_default())
    }

    async fn save_memory(&self, user_id: &str, memory: &Map<String, Value>) -> Result<(), EngineError> {
        self.memory.write().await.insert(user_id.to_string(), memory.clone());
        Ok(())
    }

    async fn persist_run(&self, _state: &RunState) -> Result<(), EngineError> {
        Ok(())
    }
}
