// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process remote store.
//!
//! Behaves like the hosted backend: rows are kept in wire shape, inserts get
//! a server-assigned id and `created_at`, and every read maps rows back into
//! entities. Failures can be injected to exercise rollback paths.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::traits::{RemoteError, RemoteStore};
use crate::model::{MemorySnapshot, Project, Task};
use crate::patch::{ProjectPatch, TaskPatch};
use crate::wire::{ProjectRow, SnapshotRow, TaskRow};

pub struct InMemoryRemote {
    projects: DashMap<String, (u64, ProjectRow)>,
    tasks: DashMap<String, (u64, TaskRow)>,
    snapshots: DashMap<String, (u64, SnapshotRow)>,
    seq: AtomicU64,
    write_calls: AtomicU64,
    failure: Mutex<Option<RemoteError>>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self {
            projects: DashMap::new(),
            tasks: DashMap::new(),
            snapshots: DashMap::new(),
            seq: AtomicU64::new(0),
            write_calls: AtomicU64::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Make every following call fail with `error` (None restores normal service).
    pub fn set_failure(&self, error: Option<RemoteError>) {
        *self.failure.lock() = error;
    }

    /// Number of insert/update/delete calls received, failed ones included.
    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Store a project as-is, keeping its id.
    pub fn seed_project(&self, project: &Project) {
        let seq = self.next_seq();
        self.projects.insert(project.id.clone(), (seq, ProjectRow::from(project)));
    }

    pub fn seed_task(&self, task: &Task) {
        let seq = self.next_seq();
        self.tasks.insert(task.id.clone(), (seq, TaskRow::from(task)));
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn check_read(&self) -> Result<(), RemoteError> {
        match self.failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check_write(&self) -> Result<(), RemoteError> {
        self.write_calls.fetch_add(1, Ordering::AcqRel);
        self.check_read()
    }

    fn server_id() -> String {
        format!("srv-{}", uuid::Uuid::new_v4())
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn no_rows(table: &str, id: &str) -> RemoteError {
    RemoteError::Rejected {
        status: 404,
        message: format!("no row in {table} with id {id}"),
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn fetch_projects(&self) -> Result<Vec<Project>, RemoteError> {
        self.check_read()?;
        let mut rows: Vec<(u64, ProjectRow)> =
            self.projects.iter().map(|r| r.value().clone()).collect();
        // Newest first, like `order=created_at.desc`
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows.into_iter().map(|(_, row)| Project::from(row)).collect())
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        self.check_read()?;
        let mut rows: Vec<(u64, TaskRow)> = self.tasks.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, row)| Task::from(row)).collect())
    }

    async fn fetch_snapshots(&self) -> Result<Vec<MemorySnapshot>, RemoteError> {
        self.check_read()?;
        let mut rows: Vec<(u64, SnapshotRow)> =
            self.snapshots.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, row)| MemorySnapshot::from(row)).collect())
    }

    async fn insert_project(&self, project: &Project) -> Result<Project, RemoteError> {
        self.check_write()?;
        let mut row = ProjectRow::from(project);
        row.id = Self::server_id();
        row.created_at = Some(Utc::now());
        let seq = self.next_seq();
        self.projects.insert(row.id.clone(), (seq, row.clone()));
        Ok(Project::from(row))
    }

    async fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project, RemoteError> {
        self.check_write()?;
        let mut entry = self.projects.get_mut(id).ok_or_else(|| no_rows("projects", id))?;
        let mut project = Project::from(entry.1.clone());
        patch.apply(&mut project);
        let created_at = entry.1.created_at;
        entry.1 = ProjectRow { created_at, ..ProjectRow::from(&project) };
        Ok(project)
    }

    async fn delete_project(&self, id: &str) -> Result<(), RemoteError> {
        self.check_write()?;
        self.projects.remove(id);
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, RemoteError> {
        self.check_write()?;
        let mut row = TaskRow::from(task);
        row.id = Self::server_id();
        row.created_at = Some(Utc::now());
        let seq = self.next_seq();
        self.tasks.insert(row.id.clone(), (seq, row.clone()));
        Ok(Task::from(row))
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, RemoteError> {
        self.check_write()?;
        let mut entry = self.tasks.get_mut(id).ok_or_else(|| no_rows("tasks", id))?;
        let mut task = Task::from(entry.1.clone());
        patch.apply(&mut task);
        let created_at = entry.1.created_at;
        entry.1 = TaskRow { created_at, ..TaskRow::from(&task) };
        Ok(task)
    }

    async fn delete_task(&self, id: &str) -> Result<(), RemoteError> {
        self.check_write()?;
        self.tasks.remove(id);
        Ok(())
    }

    async fn insert_snapshot(&self, snapshot: &MemorySnapshot) -> Result<MemorySnapshot, RemoteError> {
        self.check_write()?;
        let mut row = SnapshotRow::from(snapshot);
        row.id = Self::server_id();
        let seq = self.next_seq();
        self.snapshots.insert(row.id.clone(), (seq, row.clone()));
        Ok(MemorySnapshot::from(row))
    }
}
