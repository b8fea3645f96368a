// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{MemorySnapshot, Project, Task};
use crate::patch::{ProjectPatch, TaskPatch};

/// Failure of a remote store call. Expected failures never panic or escape
/// as anything other than one of these values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote store is not configured")]
    NotConfigured,
    #[error("remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("remote store unreachable: {0}")]
    Transport(String),
    #[error("unexpected response from remote store: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Short label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Rejected { .. } => "rejected",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
        }
    }
}

/// Failure of the local durable slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("local cache backend error: {0}")]
    Backend(String),
    #[error("local cache payload is malformed: {0}")]
    Malformed(String),
}

/// Remote persistence, scoped to the signed-in owner.
///
/// Every returned entity is already mapped from the backend row shape, so
/// callers never see wire field names.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_projects(&self) -> Result<Vec<Project>, RemoteError>;
    async fn fetch_tasks(&self) -> Result<Vec<Task>, RemoteError>;
    async fn fetch_snapshots(&self) -> Result<Vec<MemorySnapshot>, RemoteError>;

    async fn insert_project(&self, project: &Project) -> Result<Project, RemoteError>;
    async fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project, RemoteError>;
    async fn delete_project(&self, id: &str) -> Result<(), RemoteError>;

    async fn insert_task(&self, task: &Task) -> Result<Task, RemoteError>;
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, RemoteError>;
    async fn delete_task(&self, id: &str) -> Result<(), RemoteError>;

    async fn insert_snapshot(&self, snapshot: &MemorySnapshot) -> Result<MemorySnapshot, RemoteError>;
}

/// A durable key-value slot holding serialized payloads.
#[async_trait]
pub trait LocalSlot: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn write(&self, key: &str, payload: &str) -> Result<(), CacheError>;
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}
