// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;

use super::traits::{RemoteError, RemoteStore};
use crate::model::{MemorySnapshot, Project, Task};
use crate::patch::{ProjectPatch, TaskPatch};

/// Stand-in used when no backend is configured. Every call fails with
/// [`RemoteError::NotConfigured`] without touching the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredRemote;

#[async_trait]
impl RemoteStore for UnconfiguredRemote {
    async fn fetch_projects(&self) -> Result<Vec<Project>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn fetch_snapshots(&self) -> Result<Vec<MemorySnapshot>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert_project(&self, _project: &Project) -> Result<Project, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn update_project(&self, _id: &str, _patch: &ProjectPatch) -> Result<Project, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_project(&self, _id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert_task(&self, _task: &Task) -> Result<Task, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn update_task(&self, _id: &str, _patch: &TaskPatch) -> Result<Task, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_task(&self, _id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert_snapshot(&self, _snapshot: &MemorySnapshot) -> Result<MemorySnapshot, RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}
