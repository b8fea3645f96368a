// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Project mutations.

use std::sync::Arc;

use tracing::debug;

use crate::model::{EntityKind, NewProject, Project};
use crate::patch::ProjectPatch;

use super::reconcile::Edit;
use super::{temp_id, Mutation, SyncEngine, SyncError};

impl SyncEngine {
    /// Create a project: planned, 0% progress, worked on now.
    ///
    /// The project is at the head of [`projects()`](Self::projects) under a
    /// temporary id when this returns. The mutation resolves with the
    /// server's record, which has replaced the temporary one in place.
    pub fn create_project(&self, draft: NewProject) -> Result<Mutation<Project>, SyncError> {
        let user_id = self.require_owner()?;
        let project = Project::from_draft(temp_id(), user_id, draft);
        let pending = self.core.begin_insert(project.clone())?;
        debug!(id = %project.id, "Project created locally");

        let core = Arc::clone(&self.core);
        let remote = Arc::clone(&self.remote);
        Ok(Mutation::spawn(async move {
            let outcome = remote.insert_project(&project).await.map(Some);
            let saved = core.reconcile(pending, outcome, true).await?;
            Ok(saved.unwrap_or(project))
        }))
    }

    /// Apply `patch` to project `id`, sending only the fields that differ.
    ///
    /// When nothing differs the returned mutation is already settled with
    /// the current project and the remote store is not contacted. An edit
    /// of a project whose create is still in flight goes out once the
    /// server id is known.
    pub fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<Mutation<Project>, SyncError> {
        self.require_owner()?;

        let mut patch = patch;
        let edit = self.core.begin_update::<Project>(id, |current| {
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
                crate::metrics::record_mutation(EntityKind::Project.as_str(), "update", "noop");
                return Ok(Mutation::settled(Ok(current)));
            }
            Edit::Written(pending) => pending,
        };
        debug!(id = %id, fields = ?patch.field_names(), "Project updated locally");

        let core = Arc::clone(&self.core);
        let remote = Arc::clone(&self.remote);
        Ok(Mutation::spawn(async move {
            let pending = core.ready(pending).await?;
            let id = pending.id().to_string();
            let outcome = remote.update_project(&id, &patch).await.map(Some);
            let saved = core.reconcile(pending, outcome, true).await?;
            saved.ok_or(SyncError::NotFound { kind: EntityKind::Project, id })
        }))
    }

    /// Remove project `id`. Its tasks and snapshots are left alone.
    pub fn delete_project(&self, id: &str) -> Result<Mutation<()>, SyncError> {
        self.require_owner()?;
        let pending = self.core.begin_remove::<Project>(id)?;
        debug!(id = %id, "Project removed locally");

        let core = Arc::clone(&self.core);
        let remote = Arc::clone(&self.remote);
        Ok(Mutation::spawn(async move {
            let pending = core.ready(pending).await?;
            let outcome = remote.delete_project(pending.id()).await.map(|()| None);
            core.reconcile(pending, outcome, true).await.map(|_| ())
        }))
    }
}
