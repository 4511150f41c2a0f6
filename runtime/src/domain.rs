//! Remote-backed domain store.
//!
//! [`DomainStore`] is the one type every entity collection is kept in. It
//! wraps a [`Store`] running the synced-collection reducer and exposes the
//! operations callers need: reading and observing the current collection,
//! mutating it locally, and synchronising it with the backend.

use crate::error::StoreError;
use crate::metrics::SyncMetrics;
use crate::store::Store;
use crate::subscription::{SnapshotStream, Subscription};
use placebook_core::sync::{
    RemoteCollection, SyncAction, SyncConfig, SyncEnvironment, SyncReducer, SyncState,
};
use placebook_core::{Entity, Snapshot, SyncError};
use std::fmt;
use std::sync::Arc;

type SyncStore<T> = Store<SyncState<T>, SyncAction<T>, SyncEnvironment<T>, SyncReducer<T>>;

impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        Self::Runtime(error.to_string())
    }
}

/// Observable, remote-backed collection of one entity type
///
/// Clones share the same state and subscribers.
pub struct DomainStore<T: Entity> {
    store: SyncStore<T>,
}

impl<T: Entity> Clone for DomainStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: Entity> fmt::Debug for DomainStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainStore")
            .field("entity", &std::any::type_name::<T>())
            .field("revision", &self.current().revision())
            .finish_non_exhaustive()
    }
}

impl<T: Entity> DomainStore<T> {
    /// Create an empty, unloaded store backed by `remote`
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteCollection<T>>, config: SyncConfig) -> Self {
        Self {
            store: Store::new(
                SyncState::new(),
                SyncReducer::new(),
                SyncEnvironment::new(remote, config),
            ),
        }
    }

    // ========== Observation ==========

    /// The latest snapshot
    ///
    /// Before anything was loaded this is an empty snapshot whose
    /// [`Snapshot::is_loaded`] is `false`.
    #[must_use]
    pub fn current(&self) -> Snapshot<T> {
        self.store.snapshot()
    }

    /// Stream of snapshots, starting with the latest one
    #[must_use]
    pub fn stream(&self) -> SnapshotStream<Snapshot<T>> {
        self.store.stream()
    }

    /// Attach a listener; it receives the latest snapshot immediately
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Snapshot<T>) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    /// Number of attached listeners
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }

    /// Mutations with a tentative change still applied
    #[must_use]
    pub fn pending_mutations(&self) -> usize {
        self.store.state(SyncState::pending_count)
    }

    /// Last remote failure, cleared by a successful fetch
    #[must_use]
    pub fn last_error(&self) -> Option<SyncError> {
        self.store.state(|state| state.last_error().cloned())
    }

    // ========== Local mutations ==========

    /// Replace the whole collection
    pub fn replace_all(&self, items: Vec<T>) {
        self.apply_local(SyncAction::ReplaceAll(items));
    }

    /// Insert an entity, or replace the one with the same id in place
    pub fn upsert_one(&self, item: T) {
        self.apply_local(SyncAction::UpsertOne(item));
    }

    /// Remove an entity by id; absent ids are ignored and emit nothing
    pub fn remove_one(&self, id: &T::Id) {
        self.apply_local(SyncAction::RemoveOne(id.clone()));
    }

    // ========== Remote sync ==========

    /// Replace the collection with the backend's
    ///
    /// On failure the collection is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged.
    #[tracing::instrument(skip(self), fields(entity = std::any::type_name::<T>()))]
    pub async fn fetch_all(&self) -> Result<Snapshot<T>, SyncError> {
        match self.request(SyncAction::FetchAll).await? {
            SyncAction::Fetched(_) => Ok(self.current()),
            outcome => Err(Self::failure("fetch", &outcome)),
        }
    }

    /// Create an entity and return it with its backend id
    ///
    /// In optimistic mode a provisional entity is visible until the backend
    /// answers, then replaced in place by the confirmed one or removed.
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged; the collection is rolled back.
    #[tracing::instrument(skip(self, draft), fields(entity = std::any::type_name::<T>()))]
    pub async fn add_one(&self, draft: T::Draft) -> Result<T, SyncError> {
        match self.request(SyncAction::Add(draft)).await? {
            SyncAction::Added { entity, .. } => {
                tracing::debug!(id = %entity.id(), "Entity created");
                Ok(entity)
            },
            outcome => Err(Self::failure("add", &outcome)),
        }
    }

    /// Overwrite an entity on the backend
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged; the previous value is restored.
    #[tracing::instrument(skip(self, entity), fields(entity = std::any::type_name::<T>(), id = %entity.id()))]
    pub async fn update_one(&self, entity: T) -> Result<T, SyncError> {
        match self.request(SyncAction::Update(entity)).await? {
            SyncAction::Updated { entity, .. } => Ok(entity),
            outcome => Err(Self::failure("update", &outcome)),
        }
    }

    /// Delete an entity on the backend
    ///
    /// # Errors
    ///
    /// Returns the remote failure unchanged; the entity is reinserted at its
    /// previous position.
    #[tracing::instrument(skip(self, id), fields(entity = std::any::type_name::<T>(), id = %id))]
    pub async fn delete_one(&self, id: &T::Id) -> Result<(), SyncError> {
        match self.request(SyncAction::Delete(id.clone())).await? {
            SyncAction::Deleted { .. } => Ok(()),
            outcome => Err(Self::failure("delete", &outcome)),
        }
    }

    async fn request(&self, action: SyncAction<T>) -> Result<SyncAction<T>, SyncError> {
        Ok(self.store.send_and_wait_for(action, SyncAction::is_outcome).await?)
    }

    fn apply_local(&self, action: SyncAction<T>) {
        let effects = self.store.dispatch(action);
        debug_assert!(effects.is_empty(), "local mutations never produce effects");
    }

    fn failure(operation: &'static str, outcome: &SyncAction<T>) -> SyncError {
        SyncMetrics::record_failure(operation);
        match outcome.error() {
            Some(error) => {
                tracing::warn!(operation, %error, "Remote operation failed");
                error.clone()
            },
            None => SyncError::Runtime(format!("unexpected outcome for {operation}: {outcome:?}")),
        }
    }
}
