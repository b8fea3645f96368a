// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Local snapshot of the whole dataset.
//!
//! The full `{projects, tasks, snapshots}` dataset is serialized as JSON
//! into a single durable slot under a fixed, versioned key. Loading never
//! fails: an absent or unreadable payload yields the empty dataset.
//!
//! # Storage
//!
//! The durable slot is a SQLite table (or a process-local map):
//!
//! ```sql
//! CREATE TABLE local_snapshots (
//!     key TEXT PRIMARY KEY,          -- "mindtrail_data.v1"
//!     payload TEXT NOT NULL,         -- JSON dataset
//!     saved_at INTEGER NOT NULL      -- Unix timestamp
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{any::AnyPoolOptions, AnyPool, Row};
use tracing::{debug, info, warn};

use super::traits::{CacheError, LocalSlot};
use crate::config::SyncConfig;
use crate::model::Dataset;

/// Slot kept in process memory. Survives engine restarts within a process.
#[derive(Default)]
pub struct MemorySlot {
    entries: DashMap<String, String>,
}

impl MemorySlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalSlot for MemorySlot {
    async fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn write(&self, key: &str, payload: &str) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), payload.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Slot backed by a SQLite file.
pub struct SqliteSlot {
    pool: AnyPool,
}

impl SqliteSlot {
    /// Open (creating if needed) the SQLite file at `path`.
    pub async fn open(path: &str) -> Result<Self, CacheError> {
        sqlx::any::install_default_drivers();

        let url = format!("sqlite://{}?mode=rwc", path);

        let pool = AnyPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&url)
            .await
            .map_err(|e| CacheError::Backend(format!(
                "Failed to open local cache DB: {}", e
            )))?;

        let slot = Self { pool };
        slot.init_schema().await?;

        Ok(slot)
    }

    /// Create from an existing pool.
    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn init_schema(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS local_snapshots (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            )
            "#
        )
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!(
                "Failed to create local_snapshots table: {}", e
            )))?;

        Ok(())
    }
}

#[async_trait]
impl LocalSlot for SqliteSlot {
    async fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT payload FROM local_snapshots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!(
                "Failed to read local snapshot: {}", e
            )))?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, key: &str, payload: &str) -> Result<(), CacheError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO local_snapshots (key, payload, saved_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at
            "#
        )
            .bind(key)
            .bind(payload)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!(
                "Failed to write local snapshot: {}", e
            )))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM local_snapshots WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(format!(
                "Failed to remove local snapshot: {}", e
            )))?;

        Ok(())
    }
}

/// Reads and writes the dataset under one versioned key.
#[derive(Clone)]
pub struct LocalSnapshotStore {
    slot: Arc<dyn LocalSlot>,
    key: String,
}

impl LocalSnapshotStore {
    pub fn new(slot: Arc<dyn LocalSlot>, key: impl Into<String>) -> Self {
        Self { slot, key: key.into() }
    }

    /// In-memory slot under the default key.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySlot::new()), SyncConfig::default().cache_key)
    }

    /// SQLite slot when `cache_path` is set, in-memory otherwise.
    pub async fn from_config(config: &SyncConfig) -> Result<Self, CacheError> {
        let slot: Arc<dyn LocalSlot> = match &config.cache_path {
            Some(path) => {
                info!(path = %path, "Opening local snapshot cache");
                Arc::new(SqliteSlot::open(path).await?)
            }
            None => Arc::new(MemorySlot::new()),
        };
        Ok(Self::new(slot, config.cache_key.clone()))
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize the full dataset into the slot, replacing what was there.
    pub async fn save(&self, dataset: &Dataset) -> Result<(), CacheError> {
        let payload = serde_json::to_string(dataset)
            .map_err(|e| CacheError::Malformed(e.to_string()))?;
        let result = self.slot.write(&self.key, &payload).await;
        crate::metrics::record_cache_save(result.is_ok());
        if result.is_ok() {
            debug!(
                key = %self.key,
                projects = dataset.projects.len(),
                tasks = dataset.tasks.len(),
                snapshots = dataset.snapshots.len(),
                "Local snapshot saved"
            );
        }
        result
    }

    /// Load the saved dataset, distinguishing absent from unreadable.
    pub async fn try_load(&self) -> Result<Option<Dataset>, CacheError> {
        match self.slot.read(&self.key).await? {
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| CacheError::Malformed(e.to_string())),
            None => Ok(None),
        }
    }

    /// Load the saved dataset. Absent, corrupt or unreadable → empty.
    pub async fn load(&self) -> Dataset {
        match self.try_load().await {
            Ok(Some(dataset)) => {
                crate::metrics::record_cache_load("hit");
                dataset
            }
            Ok(None) => {
                crate::metrics::record_cache_load("miss");
                Dataset::default()
            }
            Err(CacheError::Malformed(reason)) => {
                crate::metrics::record_cache_load("malformed");
                warn!(key = %self.key, %reason, "Local snapshot is malformed, starting empty");
                Dataset::default()
            }
            Err(e) => {
                crate::metrics::record_cache_load("error");
                warn!(key = %self.key, error = %e, "Local snapshot unreadable, starting empty");
                Dataset::default()
            }
        }
    }

    /// Drop the saved dataset.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.slot.remove(&self.key).await
    }

    /// Write a raw payload, bypassing serialization.
    #[cfg(test)]
    pub(crate) async fn write_raw(&self, payload: &str) -> Result<(), CacheError> {
        self.slot.write(&self.key, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        GithubMetadata, MemorySnapshot, NewProject, NewSnapshot, NewTask, Project, Task, TaskStatus,
    };

    fn sample_dataset() -> Dataset {
        let mut project = Project::from_draft(
            "p1".into(),
            "u1".into(),
            NewProject {
                tags: vec!["rust".into(), "sync".into()],
                github_repo_url: Some("https://github.com/acme/trail".into()),
                ..NewProject::titled("Trail")
            },
        );
        project.progress = 40;
        let mut task = Task::from_draft(
            "t1".into(),
            "u1".into(),
            NewTask { title: "Wire up".into(), project_id: "p1".into() },
        );
        task.status = TaskStatus::Unrecognized("blocked".into());
        let snapshot = MemorySnapshot::from_draft(
            "s1".into(),
            "u1".into(),
            NewSnapshot {
                project_id: "p1".into(),
                thoughts: "left off in the reconciler".into(),
                github_metadata: Some(GithubMetadata {
                    repo: "acme/trail".into(),
                    branch: "main".into(),
                    commit: "0123456789abcdef".into(),
                }),
            },
        );
        Dataset { projects: vec![project], tasks: vec![task], snapshots: vec![snapshot] }
    }

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = LocalSnapshotStore::in_memory();
        let dataset = sample_dataset();

        store.save(&dataset).await.unwrap();
        assert_eq!(store.load().await, dataset);
    }

    #[tokio::test]
    async fn test_absent_is_empty() {
        let store = LocalSnapshotStore::in_memory();
        assert_eq!(store.try_load().await.unwrap(), None);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_empty() {
        let store = LocalSnapshotStore::in_memory();
        store.write_raw("{\"projects\": [oops").await.unwrap();

        assert!(matches!(store.try_load().await, Err(CacheError::Malformed(_))));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = LocalSnapshotStore::in_memory();
        store.save(&sample_dataset()).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.try_load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let config = SyncConfig {
            cache_path: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let dataset = sample_dataset();

        {
            let store = LocalSnapshotStore::from_config(&config).await.unwrap();
            store.save(&Dataset::default()).await.unwrap();
            // Upsert replaces the first payload
            store.save(&dataset).await.unwrap();
        }

        let reopened = LocalSnapshotStore::from_config(&config).await.unwrap();
        assert_eq!(reopened.load().await, dataset);
    }
}
