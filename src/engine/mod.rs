// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Optimistic sync engine.
//!
//! The [`SyncEngine`] is the single authoritative holder of the user's
//! projects, tasks and memory snapshots. Every mutation:
//!
//! 1. applies the change to the in-memory dataset before returning
//! 2. hands back a [`Mutation`] and runs the remote call on a tokio task
//! 3. reconciles: confirm with the server record, or roll back and
//!    broadcast an error [`Notice`]
//!
//! A mutation aimed at an entity whose create is still in flight reaches
//! the remote store only after that create is acknowledged, under the
//! server id.
//!
//! # Lifecycle
//!
//! ```text
//! Created → Loading → Ready → SignedOut
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mindtrail_sync::{SyncEngine, SyncConfig, Session, NewProject, EngineState};
//! use mindtrail_sync::storage::memory::InMemoryRemote;
//! use mindtrail_sync::storage::local::LocalSnapshotStore;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = SyncEngine::new(
//!     SyncConfig::default(),
//!     Some(Session::new("user-1")),
//!     Arc::new(InMemoryRemote::new()),
//!     LocalSnapshotStore::in_memory(),
//! );
//! engine.bootstrap().await;
//! assert_eq!(engine.state(), EngineState::Ready);
//!
//! let pending = engine.create_project(NewProject::titled("Compiler")).unwrap();
//! // Already visible, under a temporary id
//! assert_eq!(engine.projects().len(), 1);
//!
//! let saved = pending.await.unwrap();
//! assert_eq!(engine.projects()[0].id, saved.id);
//! # }
//! ```

mod types;
mod reconcile;
mod lifecycle;
mod projects;
mod tasks;
mod snapshots;

pub use types::{DataSource, EngineState, Mutation, Notice, NoticeLevel, Operation, SyncError};
pub use snapshots::REPO_CONTEXT_UNAVAILABLE;

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};

use crate::board::Board;
use crate::config::SyncConfig;
use crate::model::{Dataset, MemorySnapshot, Project, Task};
use crate::session::Session;
use crate::storage::local::LocalSnapshotStore;
use crate::storage::traits::RemoteStore;
use crate::view::{ProjectView, ViewQuery};

use reconcile::Core;

/// Optimistic sync engine bound to one session.
///
/// # Thread Safety
///
/// The engine is `Send + Sync`. Reads clone out of a `parking_lot::RwLock`;
/// reconciliations run on spawned tokio tasks sharing the same state, so
/// mutations must be issued from within a tokio runtime.
pub struct SyncEngine {
    pub(super) config: SyncConfig,

    /// Engine state (broadcast to watchers)
    pub(super) state: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use)
    pub(super) state_rx: watch::Receiver<EngineState>,

    /// Owner context; None once signed out
    pub(super) session: RwLock<Option<Session>>,

    /// Remote persistence (unconfigured stand-in in local-only mode)
    pub(super) remote: Arc<dyn RemoteStore>,

    /// Dataset, stamps, local cache and notices shared with in-flight tasks
    pub(super) core: Arc<Core>,
}

impl SyncEngine {
    /// Create an engine. The dataset is empty until [`bootstrap`](Self::bootstrap).
    pub fn new(
        config: SyncConfig,
        session: Option<Session>,
        remote: Arc<dyn RemoteStore>,
        cache: LocalSnapshotStore,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let core = Core::new(cache, config.notice_capacity);

        Self {
            config,
            state: state_tx,
            state_rx,
            session: RwLock::new(session),
            remote,
            core,
        }
    }

    /// Create an engine with the backends `config` describes.
    pub async fn from_config(config: SyncConfig, session: Option<Session>) -> Result<Self, SyncError> {
        let remote = crate::storage::remote_from_config(&config, session.as_ref());
        let cache = LocalSnapshotStore::from_config(&config).await?;
        Ok(Self::new(config, session, remote, cache))
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Subscribe to success/error notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.core.notices.subscribe()
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    #[must_use]
    pub fn projects(&self) -> Vec<Project> {
        self.core.tracked.read().data.projects.clone()
    }

    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.core.tracked.read().data.tasks.clone()
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<MemorySnapshot> {
        self.core.tracked.read().data.snapshots.clone()
    }

    /// Copy of the whole dataset.
    #[must_use]
    pub fn dataset(&self) -> Dataset {
        self.core.tracked.read().data.clone()
    }

    #[must_use]
    pub fn project(&self, id: &str) -> Option<Project> {
        self.core.find(id)
    }

    #[must_use]
    pub fn task(&self, id: &str) -> Option<Task> {
        self.core.find(id)
    }

    /// Kanban grouping of the current tasks.
    #[must_use]
    pub fn board(&self) -> Board {
        Board::from_tasks(&self.core.tracked.read().data.tasks)
    }

    /// Filtered, sorted projection of the current dataset.
    #[must_use]
    pub fn view(&self, query: &ViewQuery) -> ProjectView {
        ProjectView::build(&self.core.tracked.read().data, query)
    }

    /// Owner id for a new entity, or `NotAuthenticated`.
    pub(super) fn require_owner(&self) -> Result<String, SyncError> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.user_id.clone())
            .ok_or(SyncError::NotAuthenticated)
    }
}

/// Fresh temporary id for an optimistic create.
pub(super) fn temp_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
