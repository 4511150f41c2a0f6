//! Synced collection feature.
//!
//! One reducer drives every remote-backed entity store. Local mutations
//! (`ReplaceAll`, `UpsertOne`, `RemoveOne`) change the collection directly.
//! Remote requests (`FetchAll`, `Add`, `Update`, `Delete`) return an effect
//! that talks to the [`RemoteCollection`] and feeds the outcome back as an
//! action.
//!
//! Mutations are two-phase. In optimistic mode the change is applied
//! tentatively when the request is issued and recorded under a
//! [`MutationId`]; the outcome action either confirms it or rolls it back to
//! the exact prior state. In pessimistic mode nothing changes until the
//! backend confirms.

use crate::collection::{Collection, Entity, Snapshot, Undo};
use crate::effect::Effect;
use crate::error::SyncError;
use crate::reducer::Reducer;
use crate::state::Observable;
use crate::{SmallVec, smallvec};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Remote source of truth for one entity type
///
/// Each call is a single attempt; implementations must not retry.
#[async_trait]
pub trait RemoteCollection<T: Entity>: Send + Sync {
    /// Fetch the full collection
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Network`], [`SyncError::Server`] or
    /// [`SyncError::InvalidResponse`] when the request fails.
    async fn list(&self) -> Result<Vec<T>, SyncError>;

    /// Create an entity and return the id assigned by the backend
    ///
    /// # Errors
    ///
    /// Returns the transport or server error of the failed request.
    async fn create(&self, draft: &T::Draft) -> Result<T::Id, SyncError>;

    /// Overwrite an existing entity
    ///
    /// # Errors
    ///
    /// Returns the transport or server error of the failed request.
    async fn update(&self, entity: &T) -> Result<(), SyncError>;

    /// Delete an entity by id
    ///
    /// # Errors
    ///
    /// Returns the transport or server error of the failed request.
    async fn delete(&self, id: &T::Id) -> Result<(), SyncError>;
}

/// Single-entity reads from the remote, outside any store
#[async_trait]
pub trait RemoteLookup<T: Entity>: Send + Sync {
    /// Fetch one entity by id
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when the backend has no such entity,
    /// otherwise the transport or server error of the failed request.
    async fn get(&self, id: &T::Id) -> Result<T, SyncError>;
}

/// Behaviour switches for a synced store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Apply mutations before the backend confirms them
    pub optimistic: bool,
}

impl SyncConfig {
    /// Optimistic two-phase mutations
    #[must_use]
    pub const fn new() -> Self {
        Self { optimistic: true }
    }

    /// Set optimistic mode
    #[must_use]
    pub const fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = optimistic;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies one in-flight mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(u64);

impl MutationId {
    /// Create a mutation id from its sequence number
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Sequence number
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutation-{}", self.0)
    }
}

/// State of a synced store
#[derive(Clone, Debug)]
pub struct SyncState<T: Entity> {
    collection: Collection<T>,
    pending: BTreeMap<MutationId, Undo<T>>,
    next_mutation: u64,
    last_error: Option<SyncError>,
}

impl<T: Entity> Default for SyncState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> SyncState<T> {
    /// Empty, unloaded state
    #[must_use]
    pub fn new() -> Self {
        Self {
            collection: Collection::new(),
            pending: BTreeMap::new(),
            next_mutation: 0,
            last_error: None,
        }
    }

    /// The entity collection
    #[must_use]
    pub const fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    /// Number of mutations awaiting a backend answer with a tentative change applied
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a mutation still has a tentative change applied
    #[must_use]
    pub fn is_pending(&self, mutation: MutationId) -> bool {
        self.pending.contains_key(&mutation)
    }

    /// Last remote failure seen by this store, cleared by a successful fetch
    #[must_use]
    pub const fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    fn begin_mutation(&mut self) -> MutationId {
        self.next_mutation += 1;
        MutationId(self.next_mutation)
    }

    /// Retire a confirmed mutation
    ///
    /// Returns whether the confirmed result should be applied. It is not when
    /// a later mutation of the same entity is still pending, since that one's
    /// tentative value is newer.
    fn confirm(&mut self, mutation: MutationId, id: &T::Id) -> bool {
        self.pending.remove(&mutation);
        let superseded = self.later_mutation(mutation, id).is_some();
        if superseded {
            tracing::debug!(%mutation, %id, "Confirmed mutation superseded by a pending one");
        }
        !superseded
    }

    /// Revert a failed mutation
    ///
    /// When a later mutation of the same entity is still pending, the
    /// collection keeps showing that one's value. Its undo record takes over
    /// this mutation's prior state, so the entity only returns to the value
    /// it had before both once the later one fails too.
    fn roll_back(&mut self, mutation: MutationId) {
        let Some(undo) = self.pending.remove(&mutation) else {
            return;
        };
        match self.later_mutation(mutation, undo.id()) {
            Some(later) => {
                tracing::debug!(%mutation, %later, "Handing prior state to pending mutation");
                self.pending.insert(later, undo.into_restore());
            },
            None => {
                tracing::debug!(%mutation, "Rolling back tentative mutation");
                self.collection.rollback(undo);
            },
        }
    }

    fn later_mutation(&self, mutation: MutationId, id: &T::Id) -> Option<MutationId> {
        self.pending
            .range(mutation..)
            .find(|(_, undo)| undo.id() == id)
            .map(|(later, _)| *later)
    }
}

impl<T: Entity> Observable for SyncState<T> {
    type Snapshot = Snapshot<T>;

    fn revision(&self) -> u64 {
        self.collection.revision()
    }

    fn snapshot(&self) -> Snapshot<T> {
        self.collection.snapshot()
    }
}

/// Inputs of the synced collection reducer
#[derive(Clone, Debug)]
pub enum SyncAction<T: Entity> {
    // ========== Local mutations ==========
    /// Install a whole new collection
    ReplaceAll(Vec<T>),
    /// Insert or replace one entity
    UpsertOne(T),
    /// Remove one entity; absent ids are ignored
    RemoveOne(T::Id),

    // ========== Remote requests ==========
    /// Refresh the whole collection from the remote
    FetchAll,
    /// Create an entity from a draft
    Add(T::Draft),
    /// Overwrite an entity
    Update(T),
    /// Delete an entity
    Delete(T::Id),

    // ========== Remote outcomes ==========
    /// Refresh succeeded
    Fetched(Vec<T>),
    /// Refresh failed
    FetchFailed(SyncError),
    /// Create succeeded; `entity` carries the backend id
    Added {
        /// The mutation being confirmed
        mutation: MutationId,
        /// The created entity
        entity: T,
    },
    /// Create failed
    AddFailed {
        /// The mutation being rolled back
        mutation: MutationId,
        /// Why
        error: SyncError,
    },
    /// Update succeeded
    Updated {
        /// The mutation being confirmed
        mutation: MutationId,
        /// The stored entity
        entity: T,
    },
    /// Update failed
    UpdateFailed {
        /// The mutation being rolled back
        mutation: MutationId,
        /// Why
        error: SyncError,
    },
    /// Delete succeeded
    Deleted {
        /// The mutation being confirmed
        mutation: MutationId,
        /// The deleted id
        id: T::Id,
    },
    /// Delete failed
    DeleteFailed {
        /// The mutation being rolled back
        mutation: MutationId,
        /// The id that could not be deleted
        id: T::Id,
        /// Why
        error: SyncError,
    },
}

impl<T: Entity> SyncAction<T> {
    /// Whether this action reports the outcome of a remote request
    #[must_use]
    pub const fn is_outcome(&self) -> bool {
        matches!(
            self,
            Self::Fetched(_)
                | Self::FetchFailed(_)
                | Self::Added { .. }
                | Self::AddFailed { .. }
                | Self::Updated { .. }
                | Self::UpdateFailed { .. }
                | Self::Deleted { .. }
                | Self::DeleteFailed { .. }
        )
    }

    /// The failure carried by an outcome action, if any
    #[must_use]
    pub const fn error(&self) -> Option<&SyncError> {
        match self {
            Self::FetchFailed(error)
            | Self::AddFailed { error, .. }
            | Self::UpdateFailed { error, .. }
            | Self::DeleteFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Injected dependencies of the synced collection reducer
pub struct SyncEnvironment<T: Entity> {
    /// Remote source of truth
    pub remote: Arc<dyn RemoteCollection<T>>,
    /// Behaviour switches
    pub config: SyncConfig,
}

impl<T: Entity> SyncEnvironment<T> {
    /// Creates a new `SyncEnvironment`
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteCollection<T>>, config: SyncConfig) -> Self {
        Self { remote, config }
    }
}

impl<T: Entity> Clone for SyncEnvironment<T> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            config: self.config,
        }
    }
}

/// Reducer for synced collections
pub struct SyncReducer<T>(PhantomData<fn() -> T>);

impl<T> SyncReducer<T> {
    /// Creates a new `SyncReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SyncReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SyncReducer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SyncReducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SyncReducer")
    }
}

impl<T: Entity> SyncReducer<T> {
    fn fetch(env: &SyncEnvironment<T>) -> Effect<SyncAction<T>> {
        let remote = Arc::clone(&env.remote);
        Effect::future(async move {
            Some(match remote.list().await {
                Ok(items) => SyncAction::Fetched(items),
                Err(error) => SyncAction::FetchFailed(error),
            })
        })
    }

    fn create(env: &SyncEnvironment<T>, mutation: MutationId, draft: T::Draft) -> Effect<SyncAction<T>> {
        let remote = Arc::clone(&env.remote);
        Effect::future(async move {
            Some(match remote.create(&draft).await {
                Ok(id) => SyncAction::Added {
                    mutation,
                    entity: T::from_draft(id, draft),
                },
                Err(error) => SyncAction::AddFailed { mutation, error },
            })
        })
    }

    fn update(env: &SyncEnvironment<T>, mutation: MutationId, entity: T) -> Effect<SyncAction<T>> {
        let remote = Arc::clone(&env.remote);
        Effect::future(async move {
            Some(match remote.update(&entity).await {
                Ok(()) => SyncAction::Updated { mutation, entity },
                Err(error) => SyncAction::UpdateFailed { mutation, error },
            })
        })
    }

    fn delete(env: &SyncEnvironment<T>, mutation: MutationId, id: T::Id) -> Effect<SyncAction<T>> {
        let remote = Arc::clone(&env.remote);
        Effect::future(async move {
            Some(match remote.delete(&id).await {
                Ok(()) => SyncAction::Deleted { mutation, id },
                Err(error) => SyncAction::DeleteFailed {
                    mutation,
                    id,
                    error,
                },
            })
        })
    }
}

impl<T: Entity> Reducer for SyncReducer<T> {
    type State = SyncState<T>;
    type Action = SyncAction<T>;
    type Environment = SyncEnvironment<T>;

    #[allow(clippy::too_many_lines)] // One arm per action, each short
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Local mutations ==========
            SyncAction::ReplaceAll(items) => {
                state.collection.replace_all(items);
                SmallVec::new()
            },
            SyncAction::UpsertOne(item) => {
                state.collection.upsert(item);
                SmallVec::new()
            },
            SyncAction::RemoveOne(id) => {
                state.collection.remove(&id);
                SmallVec::new()
            },

            // ========== Remote requests ==========
            SyncAction::FetchAll => smallvec![Self::fetch(env)],

            SyncAction::Add(draft) => {
                let mutation = state.begin_mutation();
                if env.config.optimistic {
                    let provisional = T::from_draft(T::provisional_id(mutation.get()), draft.clone());
                    let undo = state.collection.upsert(provisional);
                    state.pending.insert(mutation, undo);
                }
                smallvec![Self::create(env, mutation, draft)]
            },

            SyncAction::Update(entity) => {
                let mutation = state.begin_mutation();
                if env.config.optimistic {
                    let undo = state.collection.upsert(entity.clone());
                    state.pending.insert(mutation, undo);
                }
                smallvec![Self::update(env, mutation, entity)]
            },

            SyncAction::Delete(id) => {
                let mutation = state.begin_mutation();
                if env.config.optimistic {
                    if let Some(undo) = state.collection.remove(&id) {
                        state.pending.insert(mutation, undo);
                    }
                }
                smallvec![Self::delete(env, mutation, id)]
            },

            // ========== Remote outcomes ==========
            SyncAction::Fetched(items) => {
                tracing::debug!(count = items.len(), "Collection fetched");
                state.collection.replace_all(items);
                state.last_error = None;
                SmallVec::new()
            },

            SyncAction::Added { mutation, entity } => {
                match state.pending.remove(&mutation) {
                    Some(Undo::Remove { id }) => state.collection.swap(&id, entity),
                    Some(undo) => {
                        // Unreachable for adds; confirm by dropping the undo record
                        tracing::warn!(%mutation, ?undo, "Unexpected undo record for add");
                        state.collection.upsert(entity);
                    },
                    None => {
                        state.collection.upsert(entity);
                    },
                }
                SmallVec::new()
            },

            // A refresh may have landed while the request was in flight, so
            // the confirmed result is applied even over a tentative change
            SyncAction::Updated { mutation, entity } => {
                if state.confirm(mutation, entity.id()) {
                    state.collection.upsert(entity);
                }
                SmallVec::new()
            },

            SyncAction::Deleted { mutation, id } => {
                if state.confirm(mutation, &id) {
                    state.collection.remove(&id);
                }
                SmallVec::new()
            },

            SyncAction::FetchFailed(error) => {
                tracing::warn!(%error, "Collection fetch failed");
                state.last_error = Some(error);
                SmallVec::new()
            },

            SyncAction::AddFailed { mutation, error }
            | SyncAction::UpdateFailed { mutation, error }
            | SyncAction::DeleteFailed { mutation, error, .. } => {
                tracing::warn!(%mutation, %error, "Remote mutation failed");
                state.roll_back(mutation);
                state.last_error = Some(error);
                SmallVec::new()
            },
        }
    }
}
