// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Memory snapshot capture. Snapshots are never updated or deleted.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{EntityKind, MemorySnapshot, NewSnapshot};
use crate::repo_lookup::RepoLookup;

use super::{temp_id, Mutation, Notice, Operation, SyncEngine, SyncError};

/// Shown when repository context could not be fetched for a snapshot.
pub const REPO_CONTEXT_UNAVAILABLE: &str = "Could not fetch GitHub context.";

impl SyncEngine {
    /// Save a snapshot of the user's thinking on an existing project.
    pub fn create_snapshot(&self, draft: NewSnapshot) -> Result<Mutation<MemorySnapshot>, SyncError> {
        let user_id = self.require_owner()?;
        let snapshot = MemorySnapshot::from_draft(temp_id(), user_id, draft);
        let pending = self.core.begin_insert(snapshot.clone())?;
        debug!(id = %snapshot.id, project_id = %snapshot.project_id, "Snapshot saved locally");

        let core = Arc::clone(&self.core);
        let remote = Arc::clone(&self.remote);
        Ok(Mutation::spawn(async move {
            let pending = core.ready(pending).await?;
            let snapshot = pending.written().cloned().unwrap_or(snapshot);
            let outcome = remote.insert_snapshot(&snapshot).await.map(Some);
            let saved = core.reconcile(pending, outcome, true).await?;
            Ok(saved.unwrap_or(snapshot))
        }))
    }

    /// Save a snapshot, first capturing the latest commit of the project's
    /// linked repository.
    ///
    /// The lookup only runs when the project links a repository and the
    /// session carries a provider token. A failed lookup never blocks the
    /// save: the snapshot goes out without metadata and a warning notice is
    /// broadcast.
    pub async fn capture_snapshot(
        &self,
        project_id: &str,
        thoughts: impl Into<String>,
        lookup: &dyn RepoLookup,
    ) -> Result<Mutation<MemorySnapshot>, SyncError> {
        self.require_owner()?;
        let project = self.project(project_id).ok_or_else(|| SyncError::NotFound {
            kind: EntityKind::Project,
            id: project_id.to_string(),
        })?;
        let token = self.session.read().as_ref().and_then(|s| s.provider_token.clone());

        let github_metadata = match (project.github_repo_url.as_deref(), token) {
            (Some(url), Some(token)) => match lookup.latest_commit(&token, url).await {
                Ok(metadata) => {
                    crate::metrics::record_repo_lookup("latest_commit", true);
                    Some(metadata)
                }
                Err(e) => {
                    warn!(project_id = %project_id, error = %e, "Repository lookup failed, saving without context");
                    crate::metrics::record_repo_lookup("latest_commit", false);
                    self.core.notify(Notice::warning(
                        EntityKind::Snapshot,
                        Operation::Create,
                        REPO_CONTEXT_UNAVAILABLE,
                    ));
                    None
                }
            },
            _ => None,
        };

        self.create_snapshot(NewSnapshot {
            project_id: project_id.to_string(),
            thoughts: thoughts.into(),
            github_metadata,
        })
    }
}
