// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine lifecycle: bootstrap, refresh and sign-out.

use tracing::{debug, info, warn};

use crate::model::{Dataset, EntityKind};
use crate::storage::traits::RemoteError;

use super::{DataSource, EngineState, SyncEngine, SyncError};

impl SyncEngine {
    /// Load the dataset for this session.
    ///
    /// Bootstrap policy:
    /// 1. With a session, fetch all three collections from the remote store.
    ///    On success adopt them and overwrite the local snapshot.
    /// 2. Otherwise (no session, unconfigured, offline, rejected) load the
    ///    local snapshot.
    /// 3. Nothing saved locally either → start empty.
    ///
    /// Never fails: every fallback ends in a usable dataset.
    #[tracing::instrument(skip(self), fields(source))]
    pub async fn bootstrap(&self) -> DataSource {
        let started = std::time::Instant::now();
        let _ = self.state.send(EngineState::Loading);
        crate::metrics::set_engine_state("Loading");

        let has_session = self.session.read().is_some();
        let remote = if has_session {
            match self.fetch_remote().await {
                Ok(data) => Some(data),
                Err((_, RemoteError::NotConfigured)) => {
                    debug!("Remote store not configured, using local snapshot");
                    None
                }
                Err((_, e)) => {
                    warn!(error = %e, "Remote fetch failed, falling back to local snapshot");
                    crate::metrics::record_remote_error("bootstrap", e.label());
                    None
                }
            }
        } else {
            debug!("No session, skipping remote fetch");
            None
        };

        let source = match remote {
            Some(data) => {
                self.core.tracked.write().replace(data);
                // Remote is the source of truth: overwrite the local snapshot
                self.core.persist().await;
                DataSource::Remote
            }
            None => {
                let data = self.core.cache.load().await;
                let source = if data.is_empty() { DataSource::Empty } else { DataSource::LocalCache };
                crate::metrics::set_dataset_sizes(data.projects.len(), data.tasks.len(), data.snapshots.len());
                self.core.tracked.write().replace(data);
                source
            }
        };

        tracing::Span::current().record("source", source.as_str());
        crate::metrics::record_bootstrap(source.as_str());
        let _ = self.state.send(EngineState::Ready);
        crate::metrics::set_engine_state("Ready");

        let data = self.core.tracked.read();
        info!(
            source = source.as_str(),
            projects = data.data.projects.len(),
            tasks = data.data.tasks.len(),
            snapshots = data.data.snapshots.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dataset loaded"
        );
        source
    }

    /// Fetch all three collections. A failure names the collection it came from.
    async fn fetch_remote(&self) -> Result<Dataset, (EntityKind, RemoteError)> {
        let (projects, tasks, snapshots) = tokio::try_join!(
            async { self.remote.fetch_projects().await.map_err(|e| (EntityKind::Project, e)) },
            async { self.remote.fetch_tasks().await.map_err(|e| (EntityKind::Task, e)) },
            async { self.remote.fetch_snapshots().await.map_err(|e| (EntityKind::Snapshot, e)) },
        )?;
        Ok(Dataset { projects, tasks, snapshots })
    }

    /// Re-read the dataset from the remote store and write it through to
    /// the local snapshot.
    ///
    /// Unlike [`bootstrap`](Self::bootstrap) this reports why the remote
    /// store could not be read, and leaves the current dataset untouched
    /// when it fails:
    ///
    /// - `NotAuthenticated` without a session
    /// - `NotConfigured` in local-only mode
    /// - `RemoteRejected` for the collection that failed to load
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.require_owner()?;
        let data = match self.fetch_remote().await {
            Ok(data) => data,
            Err((_, RemoteError::NotConfigured)) => return Err(SyncError::NotConfigured),
            Err((kind, source)) => {
                warn!(kind = %kind, error = %source, "Refresh failed, keeping current dataset");
                crate::metrics::record_remote_error("refresh", source.label());
                return Err(SyncError::RemoteRejected { kind, source });
            }
        };

        info!(
            projects = data.projects.len(),
            tasks = data.tasks.len(),
            snapshots = data.snapshots.len(),
            "Dataset refreshed"
        );
        self.core.tracked.write().replace(data);
        self.core.persist().await;
        Ok(())
    }

    /// Write the current dataset to the local snapshot now.
    pub async fn persist_local(&self) {
        self.core.persist().await;
    }

    /// End the session: drop the owner context and clear the in-memory
    /// dataset. The local snapshot is kept for the next session. In-flight
    /// reconciliations finish against the cleared dataset and find nothing
    /// of theirs to touch.
    pub fn sign_out(&self) {
        let had_session = self.session.write().take().is_some();
        self.core.close();
        self.core.tracked.write().replace(Dataset::default());
        crate::metrics::set_dataset_sizes(0, 0, 0);
        let _ = self.state.send(EngineState::SignedOut);
        crate::metrics::set_engine_state("SignedOut");
        info!(had_session, "Signed out");
    }
}
