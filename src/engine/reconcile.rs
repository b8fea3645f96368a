// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mutate-then-reconcile, shared by every entity kind.
//!
//! A mutation runs in two halves. [`Core::begin_insert`],
//! [`Core::begin_update`] and [`Core::begin_remove`] apply the optimistic
//! write under the dataset lock and return a [`Pending`] carrying the
//! rollback snapshot. [`Core::reconcile`] then folds the remote outcome
//! back in: confirm with the server record, keep the local write
//! (local-only mode), or roll back.
//!
//! # Version stamps
//!
//! Every local write takes the next stamp and records it against its
//! collection and its entity. A reconciliation only touches state that is
//! still its own:
//!
//! - rollback restores the whole pre-mutation collection when the
//!   collection stamp is unchanged, otherwise reverts only its entity,
//!   and does nothing once a newer write owns that entity
//! - a server confirmation replaces the entity only while the entity
//!   stamp is unchanged, so a newer local edit is never clobbered
//!
//! # Creates in flight
//!
//! A new entity lives under a temporary id until its create is
//! acknowledged. A confirmation always moves it to the server id, even
//! when a newer local edit keeps its fields. Writes that began while the
//! create was in flight, including inserts of children under a new
//! project, hold their remote call in [`Core::ready`] until the create
//! settles and then go out against the server id. If the create is
//! rolled back they are dropped with it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::types::{Notice, Operation, SyncError};
use crate::model::{Dataset, EntityKind, MemorySnapshot, Project, Task};
use crate::storage::local::LocalSnapshotStore;
use crate::storage::traits::RemoteError;

/// An entity kind the engine can mutate optimistically.
pub(crate) trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn collection(data: &Dataset) -> &Vec<Self>;
    fn collection_mut(data: &mut Dataset) -> &mut Vec<Self>;

    /// The project this entity belongs to, if it belongs to one.
    fn parent(&self) -> Option<&str> {
        None
    }

    fn set_parent(&mut self, _project_id: String) {}

    /// Point everything that references entity `from` at `to`.
    fn rekey_references(_data: &mut Dataset, _from: &str, _to: &str) {}
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn collection(data: &Dataset) -> &Vec<Self> {
        &data.projects
    }

    fn collection_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.projects
    }

    fn rekey_references(data: &mut Dataset, from: &str, to: &str) {
        for task in data.tasks.iter_mut().filter(|t| t.project_id == from) {
            task.project_id = to.to_string();
        }
        for snapshot in data.snapshots.iter_mut().filter(|s| s.project_id == from) {
            snapshot.project_id = to.to_string();
        }
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn collection(data: &Dataset) -> &Vec<Self> {
        &data.tasks
    }

    fn collection_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.tasks
    }

    fn parent(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn set_parent(&mut self, project_id: String) {
        self.project_id = project_id;
    }
}

impl Entity for MemorySnapshot {
    const KIND: EntityKind = EntityKind::Snapshot;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn collection(data: &Dataset) -> &Vec<Self> {
        &data.snapshots
    }

    fn collection_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.snapshots
    }

    fn parent(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn set_parent(&mut self, project_id: String) {
        self.project_id = project_id;
    }
}

/// Monotonic write stamps per collection and per entity.
#[derive(Debug, Default)]
struct Stamps {
    last: u64,
    collections: [u64; 3],
    entities: HashMap<(EntityKind, String), u64>,
}

impl Stamps {
    fn bump(&mut self, kind: EntityKind, id: &str) -> u64 {
        self.last += 1;
        self.collections[kind.index()] = self.last;
        self.entities.insert((kind, id.to_string()), self.last);
        self.last
    }

    fn entity(&self, kind: EntityKind, id: &str) -> Option<u64> {
        self.entities.get(&(kind, id.to_string())).copied()
    }

    fn collection(&self, kind: EntityKind) -> u64 {
        self.collections[kind.index()]
    }

    /// Move the entity's stamp from its temporary id to its server id.
    fn rename(&mut self, kind: EntityKind, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(stamp) = self.entities.remove(&(kind, from.to_string())) {
            self.entities.insert((kind, to.to_string()), stamp);
        }
    }

    fn forget(&mut self, kind: EntityKind, id: &str) {
        self.entities.remove(&(kind, id.to_string()));
    }
}

/// The dataset plus the stamps guarding it.
#[derive(Debug, Default)]
pub(crate) struct Tracked {
    pub(crate) data: Dataset,
    stamps: Stamps,
}

impl Tracked {
    /// Swap in a whole new dataset. Stamps stay monotonic so writes still
    /// in flight can never match a stamp issued after the swap.
    pub(crate) fn replace(&mut self, data: Dataset) {
        self.data = data;
        self.stamps = Stamps { last: self.stamps.last, ..Stamps::default() };
    }
}

/// How a create settled, as seen by the writes queued behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Landed {
    Waiting,
    /// Known to the remote store (or kept locally) under this id
    Saved(String),
    RolledBack,
}

/// Wait for a create to settle. None when it was rolled back or its
/// reconciliation never ran.
async fn wait_landed(mut rx: watch::Receiver<Landed>) -> Option<String> {
    let settled = rx.wait_for(|l| *l != Landed::Waiting).await.map(|l| l.clone());
    match settled {
        Ok(Landed::Saved(id)) => Some(id),
        _ => None,
    }
}

/// An optimistic write awaiting its remote outcome.
pub(crate) struct Pending<E> {
    id: String,
    operation: Operation,
    stamp: u64,
    /// Collection as it was before the write
    before: Vec<E>,
    /// The entity as written locally (None for removals)
    written: Option<E>,
    /// Creates only: tells queued writes how this one settled
    landed: Option<watch::Sender<Landed>>,
    /// The entity's own create, if it was still in flight
    follows: Option<watch::Receiver<Landed>>,
    /// The referenced project's create, if it was still in flight
    parent: Option<(String, watch::Receiver<Landed>)>,
}

impl<E: Entity> Pending<E> {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn written(&self) -> Option<&E> {
        self.written.as_ref()
    }

    fn retarget(&mut self, id: &str) {
        if self.id == id {
            return;
        }
        for entity in self.before.iter_mut().chain(self.written.iter_mut()) {
            if entity.id() == self.id {
                entity.set_id(id.to_string());
            }
        }
        self.id = id.to_string();
    }

    fn reparent(&mut self, from: &str, to: &str) {
        for entity in self.before.iter_mut().chain(self.written.iter_mut()) {
            if entity.parent() == Some(from) {
                entity.set_parent(to.to_string());
            }
        }
    }
}

/// Outcome of `begin_update`.
pub(crate) enum Edit<E> {
    /// Nothing differed; no write happened
    Unchanged(E),
    Written(Pending<E>),
}

/// How much a rollback restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RollbackScope {
    Collection,
    Entity,
    Skipped,
}

impl RollbackScope {
    fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Entity => "entity",
            Self::Skipped => "skipped",
        }
    }
}

type InFlight = Option<(String, watch::Receiver<Landed>)>;

/// State shared between the engine and its in-flight reconciliations.
pub(crate) struct Core {
    pub(crate) tracked: RwLock<Tracked>,
    pub(crate) cache: LocalSnapshotStore,
    pub(crate) notices: broadcast::Sender<Notice>,
    /// Unacknowledged creates by kind and temporary id
    creates: Mutex<HashMap<(EntityKind, String), watch::Receiver<Landed>>>,
    /// Held from copying the dataset until that copy is saved
    persisting: tokio::sync::Mutex<()>,
    /// Set on sign-out; late reconciliations must not touch the local cache
    closed: AtomicBool,
}

impl Core {
    pub(crate) fn new(cache: LocalSnapshotStore, notice_capacity: usize) -> Arc<Self> {
        let (notices, _) = broadcast::channel(notice_capacity.max(1));
        Arc::new(Self {
            tracked: RwLock::new(Tracked::default()),
            cache,
            notices,
            creates: Mutex::new(HashMap::new()),
            persisting: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }

    pub(crate) fn find<E: Entity>(&self, id: &str) -> Option<E> {
        E::collection(&self.tracked.read().data)
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    fn in_flight(&self, kind: EntityKind, id: &str) -> Option<watch::Receiver<Landed>> {
        self.creates.lock().get(&(kind, id.to_string())).cloned()
    }

    /// Check that `project_id` names a local project and pick up its
    /// create if that is still in flight.
    fn parent_in_flight(&self, data: &Dataset, project_id: &str) -> Result<InFlight, SyncError> {
        if data.project(project_id).is_none() {
            return Err(SyncError::NotFound { kind: EntityKind::Project, id: project_id.to_string() });
        }
        Ok(self
            .in_flight(EntityKind::Project, project_id)
            .map(|rx| (project_id.to_string(), rx)))
    }

    /// Insert `entity` at the head of its collection.
    ///
    /// Fails with `NotFound` when the entity belongs to a project that is
    /// not in the dataset.
    pub(crate) fn begin_insert<E: Entity>(&self, entity: E) -> Result<Pending<E>, SyncError> {
        let mut tracked = self.tracked.write();
        let parent = match entity.parent() {
            Some(project_id) => self.parent_in_flight(&tracked.data, project_id)?,
            None => None,
        };

        let before = E::collection(&tracked.data).clone();
        E::collection_mut(&mut tracked.data).insert(0, entity.clone());
        let stamp = tracked.stamps.bump(E::KIND, entity.id());

        let (landed, receiver) = watch::channel(Landed::Waiting);
        self.creates.lock().insert((E::KIND, entity.id().to_string()), receiver);
        Ok(Pending {
            id: entity.id().to_string(),
            operation: Operation::Create,
            stamp,
            before,
            written: Some(entity),
            landed: Some(landed),
            follows: None,
            parent,
        })
    }

    /// Replace entity `id` with what `edit` returns; `None` from `edit`
    /// means nothing changed and nothing is written. Moving the entity to
    /// a project that is not in the dataset fails with `NotFound`.
    pub(crate) fn begin_update<E: Entity>(
        &self,
        id: &str,
        edit: impl FnOnce(&E) -> Option<E>,
    ) -> Result<Edit<E>, SyncError> {
        let mut tracked = self.tracked.write();
        let position = E::collection(&tracked.data)
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| SyncError::NotFound { kind: E::KIND, id: id.to_string() })?;

        let current = &E::collection(&tracked.data)[position];
        let Some(updated) = edit(current) else {
            return Ok(Edit::Unchanged(current.clone()));
        };
        let parent = match updated.parent() {
            Some(project_id) if current.parent() != Some(project_id) => {
                self.parent_in_flight(&tracked.data, project_id)?
            }
            _ => None,
        };

        let before = E::collection(&tracked.data).clone();
        E::collection_mut(&mut tracked.data)[position] = updated.clone();
        let stamp = tracked.stamps.bump(E::KIND, id);
        Ok(Edit::Written(Pending {
            id: id.to_string(),
            operation: Operation::Update,
            stamp,
            before,
            written: Some(updated),
            landed: None,
            follows: self.in_flight(E::KIND, id),
            parent,
        }))
    }

    /// Remove entity `id` from its collection.
    pub(crate) fn begin_remove<E: Entity>(&self, id: &str) -> Result<Pending<E>, SyncError> {
        let mut tracked = self.tracked.write();
        let position = E::collection(&tracked.data)
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| SyncError::NotFound { kind: E::KIND, id: id.to_string() })?;

        let before = E::collection(&tracked.data).clone();
        E::collection_mut(&mut tracked.data).remove(position);
        let stamp = tracked.stamps.bump(E::KIND, id);
        Ok(Pending {
            id: id.to_string(),
            operation: Operation::Delete,
            stamp,
            before,
            written: None,
            landed: None,
            follows: self.in_flight(E::KIND, id),
            parent: None,
        })
    }

    /// Hold `pending` until the creates it depends on have settled, then
    /// point it at their server ids.
    ///
    /// A write whose own create was rolled back is dropped. A write whose
    /// project create was rolled back is rolled back itself. Both resolve
    /// with `NotFound` for the entity that never reached the remote store.
    pub(crate) async fn ready<E: Entity>(&self, mut pending: Pending<E>) -> Result<Pending<E>, SyncError> {
        if let Some(follows) = pending.follows.take() {
            match wait_landed(follows).await {
                Some(id) => pending.retarget(&id),
                None => return Err(self.abandon(pending)),
            }
        }
        if let Some((project_id, parent)) = pending.parent.take() {
            match wait_landed(parent).await {
                Some(id) => pending.reparent(&project_id, &id),
                None => {
                    if let Some(landed) = pending.landed.take() {
                        self.publish(E::KIND, pending.id.clone(), landed, Landed::RolledBack);
                    }
                    self.undo(pending, &format!("project {project_id} was never saved"));
                    return Err(SyncError::NotFound { kind: EntityKind::Project, id: project_id });
                }
            }
        }
        Ok(pending)
    }

    /// Report a write whose entity's create was rolled back. The rollback
    /// already removed the entity, so there is nothing left to undo.
    fn abandon<E: Entity>(&self, pending: Pending<E>) -> SyncError {
        let (kind, operation) = (E::KIND, pending.operation);
        warn!(kind = %kind, id = %pending.id, operation = operation.as_str(), "Entity was never saved, write dropped");
        crate::metrics::record_mutation(kind.as_str(), operation.as_str(), "dropped");
        self.notify(Notice::error(kind, operation));
        SyncError::NotFound { kind, id: pending.id }
    }

    fn publish(&self, kind: EntityKind, temp_id: String, landed: watch::Sender<Landed>, outcome: Landed) {
        self.creates.lock().remove(&(kind, temp_id));
        // Nothing queued behind the create is fine
        let _ = landed.send(outcome);
    }

    /// Fold the server's record into the dataset.
    ///
    /// The entity takes the record only while the entity stamp is still
    /// the pending one. A create moves the entity to the server id either
    /// way, keeping newer local fields. Returns false when skipped as stale.
    fn confirm<E: Entity>(&self, pending: &Pending<E>, saved: &E) -> bool {
        let mut guard = self.tracked.write();
        let tracked = &mut *guard;
        let current = tracked.stamps.entity(E::KIND, &pending.id) == Some(pending.stamp);
        let creating = pending.operation == Operation::Create;

        let slot = E::collection_mut(&mut tracked.data)
            .iter_mut()
            .find(|e| e.id() == pending.id);
        match slot {
            Some(slot) if current => *slot = saved.clone(),
            Some(slot) if creating => slot.set_id(saved.id().to_string()),
            // Removed locally meanwhile; the stamp still moves so the removal can settle
            None if creating => {}
            _ => return false,
        }
        if creating {
            E::rekey_references(&mut tracked.data, &pending.id, saved.id());
        }
        tracked.stamps.rename(E::KIND, &pending.id, saved.id());
        current
    }

    fn settle_removal<E: Entity>(&self, pending: &Pending<E>) {
        let mut tracked = self.tracked.write();
        if tracked.stamps.entity(E::KIND, &pending.id) == Some(pending.stamp) {
            tracked.stamps.forget(E::KIND, &pending.id);
        }
    }

    /// Undo the pending write as far as it is still ours. A failed create
    /// always takes its entity with it, newer local edits included.
    fn roll_back<E: Entity>(&self, pending: Pending<E>) -> RollbackScope {
        let mut tracked = self.tracked.write();

        if tracked.stamps.collection(E::KIND) == pending.stamp {
            *E::collection_mut(&mut tracked.data) = pending.before;
            if pending.operation == Operation::Create {
                tracked.stamps.forget(E::KIND, &pending.id);
            }
            return RollbackScope::Collection;
        }

        if pending.operation == Operation::Create {
            E::collection_mut(&mut tracked.data).retain(|e| e.id() != pending.id);
            tracked.stamps.forget(E::KIND, &pending.id);
            return RollbackScope::Entity;
        }

        if tracked.stamps.entity(E::KIND, &pending.id) != Some(pending.stamp) {
            return RollbackScope::Skipped;
        }

        let original = pending
            .before
            .iter()
            .position(|e| e.id() == pending.id)
            .map(|index| (index, pending.before[index].clone()));
        let collection = E::collection_mut(&mut tracked.data);
        match pending.operation {
            Operation::Update => {
                if let (Some(slot), Some((_, value))) =
                    (collection.iter_mut().find(|e| e.id() == pending.id), original)
                {
                    *slot = value;
                }
            }
            Operation::Delete => {
                if let Some((index, value)) = original {
                    // Back after the entity that preceded it, if that one is still here
                    let at = index
                        .checked_sub(1)
                        .and_then(|prev| {
                            let prev_id = pending.before[prev].id();
                            collection.iter().position(|e| e.id() == prev_id)
                        })
                        .map_or(index.min(collection.len()), |prev| prev + 1);
                    collection.insert(at, value);
                }
            }
            Operation::Create => {}
        }
        RollbackScope::Entity
    }

    /// Roll back a failed write and report it.
    fn undo<E: Entity>(&self, pending: Pending<E>, cause: &dyn fmt::Display) {
        let (kind, operation, id) = (E::KIND, pending.operation, pending.id.clone());
        let scope = self.roll_back(pending);
        warn!(
            kind = %kind,
            id = %id,
            operation = operation.as_str(),
            scope = scope.as_str(),
            error = %cause,
            "Mutation failed, rolled back"
        );
        crate::metrics::record_rollback(kind.as_str(), scope.as_str());
        crate::metrics::record_mutation(kind.as_str(), operation.as_str(), "rolled_back");
        self.notify(Notice::error(kind, operation));
    }

    /// Fold a remote outcome into the dataset.
    ///
    /// `saved` is the server record for inserts and updates, `None` for
    /// deletes. Resolves with the entity as it now stands (None for deletes).
    pub(crate) async fn reconcile<E: Entity>(
        &self,
        mut pending: Pending<E>,
        outcome: Result<Option<E>, RemoteError>,
        notify_success: bool,
    ) -> Result<Option<E>, SyncError> {
        let kind = E::KIND;
        let operation = pending.operation;
        let landed = pending.landed.take();
        let temp_id = pending.id.clone();

        let result = match outcome {
            Ok(saved) => {
                let resolved = match saved {
                    Some(saved) => {
                        if self.confirm(&pending, &saved) {
                            debug!(kind = %kind, id = %pending.id, server_id = %saved.id(), "Mutation confirmed");
                        } else {
                            crate::metrics::record_stale_reconcile(kind.as_str());
                            debug!(
                                kind = %kind,
                                id = %pending.id,
                                server_id = %saved.id(),
                                "Newer local write exists, local fields kept"
                            );
                        }
                        Some(saved)
                    }
                    None => {
                        self.settle_removal(&pending);
                        debug!(kind = %kind, id = %pending.id, "Removal confirmed");
                        pending.written
                    }
                };
                crate::metrics::record_mutation(kind.as_str(), operation.as_str(), "confirmed");
                if notify_success {
                    self.notify(Notice::success(kind, operation));
                }
                self.persist().await;
                Ok(resolved)
            }
            Err(RemoteError::NotConfigured) => {
                // Local-only mode: the optimistic write is final
                self.settle_removal(&pending);
                crate::metrics::record_mutation(kind.as_str(), operation.as_str(), "local_only");
                if notify_success {
                    self.notify(Notice::success(kind, operation));
                }
                self.persist().await;
                Ok(pending.written)
            }
            Err(source) => {
                crate::metrics::record_remote_error(kind.as_str(), source.label());
                self.undo(pending, &source);
                Err(SyncError::RemoteRejected { kind, source })
            }
        };

        if let Some(landed) = landed {
            let outcome = match &result {
                Ok(Some(entity)) => Landed::Saved(entity.id().to_string()),
                _ => Landed::RolledBack,
            };
            self.publish(kind, temp_id, landed, outcome);
        }
        result
    }

    /// Write the current dataset through to the local snapshot.
    pub(crate) async fn persist(&self) {
        // Saves land in the order their copies were taken
        let _saving = self.persisting.lock().await;
        if self.closed.load(Ordering::Acquire) {
            debug!("Session closed, local snapshot left untouched");
            return;
        }
        let data = self.tracked.read().data.clone();
        crate::metrics::set_dataset_sizes(data.projects.len(), data.tasks.len(), data.snapshots.len());
        if let Err(e) = self.cache.save(&data).await {
            warn!(error = %e, "Failed to write local snapshot");
        }
    }
}
