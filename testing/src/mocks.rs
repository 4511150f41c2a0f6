//! In-memory stand-ins for remote collaborators.

use async_trait::async_trait;
use placebook_core::sync::{RemoteCollection, RemoteLookup};
use placebook_core::{Entity, SyncError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// A call received by [`InMemoryRemote`]
#[derive(Clone, Debug)]
pub enum RemoteCall<T: Entity> {
    /// `list`
    List,
    /// `get` with the id asked for
    Get(T::Id),
    /// `create` with the draft sent
    Create(T::Draft),
    /// `update` with the entity sent
    Update(T),
    /// `delete` with the id sent
    Delete(T::Id),
}

#[derive(Debug)]
struct Inner<T: Entity> {
    records: Vec<T>,
    next_ids: VecDeque<T::Id>,
    issued: u64,
    fail_next: VecDeque<SyncError>,
    fail_all: Option<SyncError>,
    calls: Vec<RemoteCall<T>>,
}

/// Backend double holding records in memory
///
/// Answers like a real backend: `create` assigns an id (scripted with
/// [`InMemoryRemote::with_next_ids`], otherwise `remote-N`), `update`
/// overwrites, `delete` removes. Failures can be scripted per call or for
/// every call. A gated remote holds each call until [`InMemoryRemote::release`]
/// lets it through, so tests can observe the store mid-flight.
#[derive(Debug)]
pub struct InMemoryRemote<T: Entity> {
    inner: Mutex<Inner<T>>,
    gate: Option<Notify>,
}

impl<T> InMemoryRemote<T>
where
    T: Entity,
    T::Id: From<String>,
{
    /// Remote pre-loaded with `records`
    #[must_use]
    pub fn new(records: Vec<T>) -> Arc<Self> {
        Arc::new(Self::build(records, None))
    }

    /// Remote whose calls wait for [`InMemoryRemote::release`]
    #[must_use]
    pub fn gated(records: Vec<T>) -> Arc<Self> {
        Arc::new(Self::build(records, Some(Notify::new())))
    }

    fn build(records: Vec<T>, gate: Option<Notify>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records,
                next_ids: VecDeque::new(),
                issued: 0,
                fail_next: VecDeque::new(),
                fail_all: None,
                calls: Vec::new(),
            }),
            gate,
        }
    }

    /// Ids handed out by the next `create` calls, in order
    pub fn with_next_ids<I>(&self, ids: I) -> &Self
    where
        I: IntoIterator<Item = T::Id>,
    {
        self.lock().next_ids.extend(ids);
        self
    }

    /// Fail the next call with `error`; queued failures are used in order
    pub fn fail_next(&self, error: SyncError) -> &Self {
        self.lock().fail_next.push_back(error);
        self
    }

    /// Fail every call with `error` until [`InMemoryRemote::recover`]
    pub fn fail_all(&self, error: SyncError) -> &Self {
        self.lock().fail_all = Some(error);
        self
    }

    /// Stop failing
    pub fn recover(&self) -> &Self {
        let mut inner = self.lock();
        inner.fail_all = None;
        inner.fail_next.clear();
        drop(inner);
        self
    }

    /// Let one held call through
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Records currently held by the backend
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.lock().records.clone()
    }

    /// Every call received, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall<T>> {
        self.lock().calls.clone()
    }

    /// Number of calls received
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    async fn admit(&self, call: RemoteCall<T>) -> Result<(), SyncError> {
        self.lock().calls.push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next.pop_front() {
            return Err(error);
        }
        inner.fail_all.clone().map_or(Ok(()), Err)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<T> RemoteCollection<T> for InMemoryRemote<T>
where
    T: Entity,
    T::Id: From<String>,
{
    async fn list(&self) -> Result<Vec<T>, SyncError> {
        self.admit(RemoteCall::List).await?;
        Ok(self.records())
    }

    async fn create(&self, draft: &T::Draft) -> Result<T::Id, SyncError> {
        self.admit(RemoteCall::Create(draft.clone())).await?;
        let mut inner = self.lock();
        inner.issued += 1;
        let issued = inner.issued;
        let id = inner
            .next_ids
            .pop_front()
            .unwrap_or_else(|| format!("remote-{issued}").into());
        inner.records.push(T::from_draft(id.clone(), draft.clone()));
        Ok(id)
    }

    async fn update(&self, entity: &T) -> Result<(), SyncError> {
        self.admit(RemoteCall::Update(entity.clone())).await?;
        let mut inner = self.lock();
        match inner.records.iter().position(|record| record.id() == entity.id()) {
            Some(index) => inner.records[index] = entity.clone(),
            None => inner.records.push(entity.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &T::Id) -> Result<(), SyncError> {
        self.admit(RemoteCall::Delete(id.clone())).await?;
        self.lock().records.retain(|record| record.id() != id);
        Ok(())
    }
}

#[async_trait]
impl<T> RemoteLookup<T> for InMemoryRemote<T>
where
    T: Entity,
    T::Id: From<String>,
{
    async fn get(&self, id: &T::Id) -> Result<T, SyncError> {
        self.admit(RemoteCall::Get(id.clone())).await?;
        self.lock()
            .records
            .iter()
            .find(|record| record.id() == id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }
}
