// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Mindtrail Sync
//!
//! Optimistic client-side sync layer for a personal project tracker:
//! projects, kanban tasks and free-text memory snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SyncEngine (engine)                    │
//! │  • Applies every mutation locally before returning          │
//! │  • Reconciles on a tokio task: confirm or roll back         │
//! │  • Version stamps guard against stale rollbacks             │
//! │  • Broadcasts success/error notices                         │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//! ┌──────────────────────────┐     ┌──────────────────────────────┐
//! │  RemoteStore (storage)   │     │  LocalSnapshotStore          │
//! │  • PostgREST over HTTP   │     │  • Whole dataset as JSON     │
//! │  • In-memory simulation  │     │  • SQLite file or memory     │
//! │  • Unconfigured stand-in │     │  • Fallback on bootstrap     │
//! └──────────────────────────┘     └──────────────────────────────┘
//!
//!   Read side: Board (kanban columns), ProjectView (filter/sort/stats)
//!   Lookup:    RepoLookup (latest commit for memory snapshots)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mindtrail_sync::{SyncConfig, SyncEngine, Session, NewProject, ProjectPatch};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::from_env();
//!     let engine = SyncEngine::from_config(config, Some(Session::new("user-1"))).await?;
//!     engine.bootstrap().await;
//!
//!     let project = engine.create_project(NewProject::titled("Compiler"))?.await?;
//!     engine
//!         .update_project(&project.id, ProjectPatch::default().with_progress(40))?
//!         .await?;
//!
//!     engine.sign_out();
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: The [`SyncEngine`] and its mutation/reconcile flow
//! - [`storage`]: Remote adapters and the local snapshot store
//! - [`model`], [`patch`], [`wire`]: Entities, partial updates, backend rows
//! - [`board`]: Kanban grouping and drag-and-drop resolution
//! - [`view`]: Filtered and sorted project view, timeline, stats
//! - [`repo_lookup`]: Repository metadata for linked projects
//! - [`resilience`]: Retry policy for remote reads

pub mod config;
pub mod model;
pub mod patch;
pub mod wire;
pub mod session;
pub mod storage;
pub mod resilience;
pub mod engine;
pub mod board;
pub mod view;
pub mod repo_lookup;
pub mod metrics;

pub use config::SyncConfig;
pub use engine::{DataSource, EngineState, Mutation, Notice, NoticeLevel, Operation, SyncEngine, SyncError};
pub use model::{
    Dataset, EntityKind, GithubMetadata, MemorySnapshot, NewProject, NewSnapshot, NewTask, Project, ProjectStatus,
    Task, TaskStatus,
};
pub use patch::{ProjectPatch, TaskPatch};
pub use session::Session;
pub use storage::traits::{CacheError, LocalSlot, RemoteError, RemoteStore};
pub use storage::local::LocalSnapshotStore;
pub use board::{Board, Column, DropTarget};
pub use view::{ProjectView, SortKey, SortOrder, ViewQuery, ViewStats};
pub use repo_lookup::{GithubLookup, LookupError, RepoLookup};
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
