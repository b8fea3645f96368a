// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sync engine.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::model::EntityKind;
use crate::storage::traits::{CacheError, RemoteError};

/// Engine lifecycle state.
///
/// Use [`super::SyncEngine::state()`] to check current state or
/// [`super::SyncEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Just created, dataset not loaded yet
    Created,
    /// Bootstrap in progress (remote fetch or local cache load)
    Loading,
    /// Dataset loaded, accepting mutations
    Ready,
    /// Session ended, dataset cleared
    SignedOut,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Loading => write!(f, "Loading"),
            Self::Ready => write!(f, "Ready"),
            Self::SignedOut => write!(f, "SignedOut"),
        }
    }
}

/// Where the bootstrap dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Fetched from the remote store (and written to the local cache)
    Remote,
    /// Loaded from the local snapshot
    LocalCache,
    /// Nothing saved anywhere
    Empty,
}

impl DataSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::LocalCache => "local_cache",
            Self::Empty => "empty",
        }
    }
}

/// The mutation a notice reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A transient, dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: EntityKind,
    pub operation: Operation,
    pub message: String,
}

impl Notice {
    pub(crate) fn success(kind: EntityKind, operation: Operation) -> Self {
        Self {
            level: NoticeLevel::Success,
            kind,
            operation,
            message: success_message(kind, operation).to_string(),
        }
    }

    pub(crate) fn error(kind: EntityKind, operation: Operation) -> Self {
        Self {
            level: NoticeLevel::Error,
            kind,
            operation,
            message: error_message(kind, operation).to_string(),
        }
    }

    pub(crate) fn warning(kind: EntityKind, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            kind,
            operation,
            message: message.into(),
        }
    }
}

fn success_message(kind: EntityKind, operation: Operation) -> &'static str {
    match (kind, operation) {
        (EntityKind::Project, Operation::Create) => "Project created successfully!",
        (EntityKind::Project, Operation::Update) => "Project updated successfully!",
        (EntityKind::Project, Operation::Delete) => "Project deleted successfully!",
        (EntityKind::Task, Operation::Create) => "Task added!",
        (EntityKind::Task, Operation::Update) => "Task updated!",
        (EntityKind::Task, Operation::Delete) => "Task deleted!",
        (EntityKind::Snapshot, _) => "Memory snapshot saved!",
    }
}

fn error_message(kind: EntityKind, operation: Operation) -> &'static str {
    match (kind, operation) {
        (EntityKind::Project, Operation::Create) => "Error creating project.",
        (EntityKind::Project, Operation::Update) => "Error updating project.",
        (EntityKind::Project, Operation::Delete) => "Error deleting project.",
        (EntityKind::Task, Operation::Create) => "Error adding task.",
        (EntityKind::Task, Operation::Update) => "Error updating task.",
        (EntityKind::Task, Operation::Delete) => "Error deleting task.",
        (EntityKind::Snapshot, _) => "Error saving snapshot.",
    }
}

/// Errors surfaced by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Only reads report this: writes in local-only mode succeed locally.
    #[error("remote store is not configured")]
    NotConfigured,
    #[error("no signed-in owner")]
    NotAuthenticated,
    #[error("remote store rejected {kind} mutation: {source}")]
    RemoteRejected {
        kind: EntityKind,
        #[source]
        source: RemoteError,
    },
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("local cache is malformed: {0}")]
    MalformedLocalCache(String),
    #[error("local cache error: {0}")]
    Cache(String),
    #[error("mutation task aborted: {0}")]
    TaskAborted(String),
}

impl From<CacheError> for SyncError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Malformed(reason) => Self::MalformedLocalCache(reason),
            CacheError::Backend(reason) => Self::Cache(reason),
        }
    }
}

/// Handle to a mutation whose optimistic write has already happened.
///
/// Resolves once the remote round trip is reconciled: `Ok` with the
/// confirmed value, or the error that caused the rollback. Dropping the
/// handle does not cancel the round trip.
pub struct Mutation<T> {
    inner: MutationInner<T>,
}

enum MutationInner<T> {
    Settled(Option<Result<T, SyncError>>),
    InFlight(JoinHandle<Result<T, SyncError>>),
}

impl<T: Send + 'static> Mutation<T> {
    /// Run the reconciliation on the tokio runtime.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        Self { inner: MutationInner::InFlight(tokio::spawn(future)) }
    }
}

impl<T> Mutation<T> {
    /// A mutation that needed no remote call.
    pub(crate) fn settled(result: Result<T, SyncError>) -> Self {
        Self { inner: MutationInner::Settled(Some(result)) }
    }

    /// True when awaiting would not wait on the remote store.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            MutationInner::Settled(_) => true,
            MutationInner::InFlight(handle) => handle.is_finished(),
        }
    }
}

impl<T> Unpin for Mutation<T> {}

impl<T> Future for Mutation<T> {
    type Output = Result<T, SyncError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            MutationInner::Settled(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(SyncError::TaskAborted("polled after completion".into()))),
            ),
            MutationInner::InFlight(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| Err(SyncError::TaskAborted(e.to_string())))
            }),
        }
    }
}
