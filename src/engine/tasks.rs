// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Task mutations and board moves.

use std::sync::Arc;

use tracing::debug;

use crate::board::{resolve_drop, DropTarget};
use crate::model::{EntityKind, NewTask, Task};
use crate::patch::TaskPatch;

use super::reconcile::Edit;
use super::{temp_id, Mutation, SyncEngine, SyncError};

impl SyncEngine {
    /// Create a task in `todo` under an existing project.
    ///
    /// A task added to a project that is still being created is sent once
    /// the project has its server id.
    pub fn create_task(&self, draft: NewTask) -> Result<Mutation<Task>, SyncError> {
        let user_id = self.require_owner()?;
        let task = Task::from_draft(temp_id(), user_id, draft);
        let pending = self.core.begin_insert(task.clone())?;
        debug!(id = %task.id, project_id = %task.project_id, "Task created locally");

        let core = Arc::clone(&self.core);
        let remote = Arc::clone(&self.remote);
        Ok(Mutation::spawn(async move {
            let pending = core.ready(pending).await?;
            let task = pending.written().cloned().unwrap_or(task);
            let outcome = remote.insert_task(&task).await.map(Some);
            let saved = core.reconcile(pending, outcome, true).await?;
            Ok(saved.unwrap_or(task))
        }))
    }

    /// Apply `patch` to task `id`, sending only the fields that differ.
    ///
    /// A patch that sets nothing but the status is a board move: it is
    /// reconciled the same way but confirms without a success notice.
    /// Failures always notify. Moving the task to a project that does not
    /// exist fails with `NotFound` before anything is written.
    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Mutation<Task>, SyncError> {
        self.require_owner()?;
        let notify_success = !patch.is_status_only();

        let mut patch = patch;
        let edit = self.core.begin_update::<Task>(id, |current| {
            patch = std::mem::take(&mut patch).minimize(current);
            if patch.is_empty() {
                return None;
            }
            let mut updated = current.clone();
            patch.apply(&mut updated);
            Some(updated)
        })?;

        let pending = match edit {
            Edit::Unchanged(current) => {
                crate::metrics::record_mutation(EntityKind::Task.as_str(), "update", "noop");
                return Ok(Mutation::settled(Ok(current)));
            }
            Edit::Written(pending) => pending,
        };
        debug!(id = %id, fields = ?patch.field_names(), "Task updated locally");

        let core = Arc::clone(&self.core);
        let remote = Arc::clone(&self.remote);
        Ok(Mutation::spawn(async move {
            let pending = core.ready(pending).await?;
            if patch.project_id.is_some() {
                patch.project_id = pending.written().map(|t| t.project_id.clone());
            }
            let id = pending.id().to_string();
            let outcome = remote.update_task(&id, &patch).await.map(Some);
            let saved = core.reconcile(pending, outcome, notify_success).await?;
            saved.ok_or(SyncError::NotFound { kind: EntityKind::Task, id })
        }))
    }

    pub fn delete_task(&self, id: &str) -> Result<Mutation<()>, SyncError> {
        self.require_owner()?;
        let pending = self.core.begin_remove::<Task>(id)?;
        debug!(id = %id, "Task removed locally");

        let core = Arc::clone(&self.core);
        let remote = Arc::clone(&self.remote);
        Ok(Mutation::spawn(async move {
            let pending = core.ready(pending).await?;
            let outcome = remote.delete_task(pending.id()).await.map(|()| None);
            core.reconcile(pending, outcome, true).await.map(|_| ())
        }))
    }

    /// Drop task `dragged_id` on `target`.
    ///
    /// Returns `Ok(None)` when the drop resolves to no change (same column,
    /// dropped on itself, unknown task or target); otherwise issues the
    /// status-only update.
    pub fn move_task(&self, dragged_id: &str, target: &DropTarget) -> Result<Option<Mutation<Task>>, SyncError> {
        let status = {
            let tracked = self.core.tracked.read();
            resolve_drop(&tracked.data.tasks, dragged_id, target)
        };
        match status {
            Some(status) => self.update_task(dragged_id, TaskPatch::status(status)).map(Some),
            None => Ok(None),
        }
    }
}
