//! Snapshot fan-out: synchronous listeners, async streams, detachment handles.
//!
//! [`Observers`] keeps the latest snapshot and the attached listeners of one
//! store. Emission is synchronous: `emit` returns after every listener has
//! seen the snapshot. A listener attaching late is called immediately with
//! the latest snapshot (replay-latest), never with an older one.
//!
//! Publishing and fan-out happen under one delivery lock, so concurrent
//! emitters reach every listener in revision order. A listener must not
//! mutate or subscribe to the store that is calling it; doing so from inside
//! the callback deadlocks.

use crate::metrics::StoreMetrics;
use futures::Stream;
use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Async stream of snapshots, starting with the latest one
pub type SnapshotStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Snapshot tagged with the revision it was taken at
#[derive(Clone)]
struct Revisioned<T> {
    revision: u64,
    snapshot: T,
}

/// Latest snapshot plus the listeners attached to it
pub struct Observers<T> {
    latest: watch::Sender<Revisioned<T>>,
    listeners: Mutex<BTreeMap<u64, Listener<T>>>,
    delivery: Mutex<()>,
    next_id: AtomicU64,
}

impl<T> Observers<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create observers seeded with an initial snapshot
    #[must_use]
    pub fn new(snapshot: T, revision: u64) -> Self {
        let (latest, _) = watch::channel(Revisioned { revision, snapshot });
        Self {
            latest,
            listeners: Mutex::new(BTreeMap::new()),
            delivery: Mutex::new(()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The most recent snapshot
    #[must_use]
    pub fn latest(&self) -> T {
        self.latest.borrow().snapshot.clone()
    }

    /// Revision of the most recent snapshot
    #[must_use]
    pub fn latest_revision(&self) -> u64 {
        self.latest.borrow().revision
    }

    /// Number of attached listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Publish a snapshot to every listener
    ///
    /// Snapshots older than (or equal to) the latest published revision are
    /// dropped, so a stale snapshot never replaces a newer one. Returns
    /// whether the snapshot was published.
    pub fn emit(&self, revision: u64, snapshot: T) -> bool {
        let _delivery = self.deliver();
        let published = self.latest.send_if_modified(|current| {
            if revision <= current.revision {
                return false;
            }
            *current = Revisioned {
                revision,
                snapshot: snapshot.clone(),
            };
            true
        });

        if !published {
            tracing::trace!(revision, "Skipped stale snapshot");
            return false;
        }

        // Listeners run outside the listener map lock so they may detach
        let listeners: Vec<Listener<T>> = self.lock().values().cloned().collect();
        tracing::trace!(revision, listeners = listeners.len(), "Emitting snapshot");
        StoreMetrics::record_emission();
        for listener in listeners {
            listener(&snapshot);
        }
        true
    }

    /// Attach a listener
    ///
    /// The listener is called immediately with the latest snapshot, then with
    /// every later emission until the returned [`Subscription`] is detached or
    /// dropped.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener<T> = Arc::new(listener);

        // Replay under the delivery lock so no newer emission overtakes it
        let delivery = self.deliver();
        let count = {
            let mut listeners = self.lock();
            listeners.insert(id, Arc::clone(&listener));
            listeners.len()
        };
        StoreMetrics::record_subscribers(count);
        tracing::debug!(subscription = id, "Subscriber attached");
        listener(&self.latest());
        drop(delivery);

        let observers = Arc::downgrade(self);
        Subscription::new(id, move || {
            if let Some(observers) = observers.upgrade() {
                observers.remove(id);
            }
        })
    }

    /// Lazy stream of snapshots
    ///
    /// The stream yields the latest snapshot first. A consumer that falls
    /// behind skips intermediate snapshots and resumes at the newest one.
    /// Dropping the stream detaches it. The stream ends when the store is
    /// dropped.
    #[must_use]
    pub fn stream(&self) -> SnapshotStream<T> {
        let mut receiver = self.latest.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                let snapshot = receiver.borrow_and_update().snapshot.clone();
                yield snapshot;
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn remove(&self, id: u64) {
        let count = {
            let mut listeners = self.lock();
            listeners.remove(&id);
            listeners.len()
        };
        StoreMetrics::record_subscribers(count);
        tracing::debug!(subscription = id, "Subscriber detached");
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, Listener<T>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("revision", &self.latest.borrow().revision)
            .finish_non_exhaustive()
    }
}

/// Detachment handle returned when subscribing
///
/// Dropping the handle detaches the listener, so scoping the handle to its
/// owner's lifetime releases it on every exit path. [`Subscription::detach`]
/// may be called explicitly; calls after the first are no-ops.
#[must_use = "dropping a Subscription detaches the listener immediately"]
pub struct Subscription {
    id: u64,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F>(id: u64, release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    /// Stop receiving snapshots; idempotent
    pub fn detach(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Whether the listener is still attached through this handle
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.release.is_some()
    }

    /// Identifier of the listener within its store
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}
