//! SQLite persistence for the engine's four collections: `blocks`,
//! `user_memory`, `pipelines`, `executions`.
//!
//! Grounded in the teacher's `db.rs`: one `rusqlite::Connection`, table
//! creation on startup, thin row <-> domain-type mapping around JSON
//! columns for the nested structures.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use orchestra_core::{BlockDefinition, EngineError, PipelineDAG, RunState};
use rusqlite::{params, Connection};
use serde_json::Map;
use tokio::sync::Mutex;
use tracing::info;

use orchestra_doer::DoerStore;

/// Opens (creating if needed) the SQLite database backing all four
/// collections.
pub fn init_db(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).context("failed to create db directory")?;
    }
    let conn = Connection::open(path).context("failed to open database")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS blocks (
            id TEXT PRIMARY KEY,
            definition_json TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE TABLE IF NOT EXISTS user_memory (
            user_id TEXT PRIMARY KEY,
            memory_json TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            profile_json TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE TABLE IF NOT EXISTS pipelines (
            id TEXT PRIMARY KEY,
            pipeline_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE TABLE IF NOT EXISTS executions (
            run_id TEXT PRIMARY KEY,
            pipeline_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL,
            run_state_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create tables")?;
    info!("Database initialized at {}", path);
    Ok(conn)
}

/// Async-safe wrapper the server state holds; also the [`DoerStore`] the
/// Doer reads/writes memory and persists runs through.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<serde_json::Value, EngineError> {
        let conn = self.conn.lock().await;
        let result: rusqlite::Result<String> =
            conn.query_row("SELECT profile_json FROM users WHERE user_id = ?1", params![user_id], |row| row.get(0));
        match result {
            Ok(json) => serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(serde_json::Value::Null),
            Err(e) => Err(EngineError::StoreError(e.to_string())),
        }
    }

    pub async fn save_user(&self, user_id: &str, profile: &serde_json::Value) -> Result<(), EngineError> {
        let json = serde_json::to_string(profile).map_err(|e| EngineError::StoreError(e.to_string()))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (user_id, profile_json, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(user_id) DO UPDATE SET profile_json = excluded.profile_json, updated_at = excluded.updated_at",
            params![user_id, json],
        )
        .map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(())
    }

    pub async fn list_blocks(&self) -> Result<Vec<BlockDefinition>, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT definition_json FROM blocks ORDER BY id")
            .map_err(|e| EngineError::StoreError(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| EngineError::StoreError(e.to_string()))?;
        let mut blocks = Vec::new();
        for row in rows {
            let json = row.map_err(|e| EngineError::StoreError(e.to_string()))?;
            blocks.push(serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string()))?);
        }
        Ok(blocks)
    }

    pub async fn get_block(&self, id: &str) -> Result<Option<BlockDefinition>, EngineError> {
        let conn = self.conn.lock().await;
        let result: rusqlite::Result<String> =
            conn.query_row("SELECT definition_json FROM blocks WHERE id = ?1", params![id], |row| row.get(0));
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string()))?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(EngineError::StoreError(e.to_string())),
        }
    }

    pub async fn save_block(&self, block: &BlockDefinition) -> Result<(), EngineError> {
        let json = serde_json::to_string(block).map_err(|e| EngineError::StoreError(e.to_string()))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO blocks (id, definition_json, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET definition_json = excluded.definition_json, updated_at = excluded.updated_at",
            params![block.id, json],
        )
        .map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_block(&self, id: &str) -> Result<(), EngineError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM blocks WHERE id = ?1", params![id]).map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(())
    }

    pub async fn list_pipelines(&self) -> Result<Vec<PipelineDAG>, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT pipeline_json FROM pipelines ORDER BY created_at DESC")
            .map_err(|e| EngineError::StoreError(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| EngineError::StoreError(e.to_string()))?;
        let mut pipelines = Vec::new();
        for row in rows {
            let json = row.map_err(|e| EngineError::StoreError(e.to_string()))?;
            pipelines.push(serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string()))?);
        }
        Ok(pipelines)
    }

    pub async fn get_pipeline(&self, id: &str) -> Result<Option<PipelineDAG>, EngineError> {
        let conn = self.conn.lock().await;
        let result: rusqlite::Result<String> =
            conn.query_row("SELECT pipeline_json FROM pipelines WHERE id = ?1", params![id], |row| row.get(0));
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string()))?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(EngineError::StoreError(e.to_string())),
        }
    }

    pub async fn save_pipeline(&self, pipeline: &PipelineDAG) -> Result<(), EngineError> {
        let json = serde_json::to_string(pipeline).map_err(|e| EngineError::StoreError(e.to_string()))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO pipelines (id, pipeline_json) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET pipeline_json = excluded.pipeline_json",
            params![pipeline.id, json],
        )
        .map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_pipeline(&self, id: &str) -> Result<(), EngineError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM pipelines WHERE id = ?1", params![id]).map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(())
    }

    pub async fn list_executions(&self, pipeline_id: Option<&str>) -> Result<Vec<RunState>, EngineError> {
        let conn = self.conn.lock().await;
        let mut stmt = match pipeline_id {
            Some(_) => conn
                .prepare("SELECT run_state_json FROM executions WHERE pipeline_id = ?1 ORDER BY created_at DESC")
                .map_err(|e| EngineError::StoreError(e.to_string()))?,
            None => conn
                .prepare("SELECT run_state_json FROM executions ORDER BY created_at DESC")
                .map_err(|e| EngineError::StoreError(e.to_string()))?,
        };
        let rows = match pipeline_id {
            Some(id) => stmt.query_map(params![id], |row| row.get::<_, String>(0)),
            None => stmt.query_map([], |row| row.get::<_, String>(0)),
        }
        .map_err(|e| EngineError::StoreError(e.to_string()))?;

        let mut runs = Vec::new();
        for row in rows {
            let json = row.map_err(|e| EngineError::StoreError(e.to_string()))?;
            runs.push(serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string()))?);
        }
        Ok(runs)
    }

    pub async fn get_execution(&self, run_id: &str) -> Result<Option<RunState>, EngineError> {
        let conn = self.conn.lock().await;
        let result: rusqlite::Result<String> =
            conn.query_row("SELECT run_state_json FROM executions WHERE run_id = ?1", params![run_id], |row| row.get(0));
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string()))?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(EngineError::StoreError(e.to_string())),
        }
    }
}

#[async_trait]
impl DoerStore for Store {
    async fn load_user(&self, user_id: &str) -> Result<serde_json::Value, EngineError> {
        self.get_user(user_id).await
    }

    async fn load_memory(&self, user_id: &str) -> Result<Map<String, serde_json::Value>, EngineError> {
        let conn = self.conn.lock().await;
        let result: rusqlite::Result<String> =
            conn.query_row("SELECT memory_json FROM user_memory WHERE user_id = ?1", params![user_id], |row| row.get(0));
        match result {
            Ok(json) => serde_json::from_str(&json).map_err(|e| EngineError::StoreError(e.to_string())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(Map::new()),
            Err(e) => Err(EngineError::StoreError(e.to_string())),
        }
    }

    async fn save_memory(&self, user_id: &str, memory: &Map<String, serde_json::Value>) -> Result<(), EngineError> {
        let json = serde_json::to_string(memory).map_err(|e| EngineError::StoreError(e.to_string()))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO user_memory (user_id, memory_json, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(user_id) DO UPDATE SET memory_json = excluded.memory_json, updated_at = excluded.updated_at",
            params![user_id, json],
        )
        .map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn persist_run(&self, state: &RunState) -> Result<(), EngineError> {
        let json = serde_json::to_string(state).map_err(|e| EngineError::StoreError(e.to_string()))?;
        let status = format!("{:?}", state.status).to_lowercase();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO executions (run_id, pipeline_id, user_id, status, run_state_json) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(run_id) DO UPDATE SET status = excluded.status, run_state_json = excluded.run_state_json",
            params![state.run_id, state.pipeline_id, state.user_id, status, json],
        )
        .map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(())
    }
}
