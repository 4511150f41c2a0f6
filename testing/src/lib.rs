//! # Placebook Testing
//!
//! Testing utilities and helpers for Placebook domain stores.
//!
//! This crate provides:
//! - An in-memory [`RemoteCollection`](placebook_core::sync::RemoteCollection)
//!   with scripted failures and call recording
//! - A recorder that captures every snapshot a listener receives
//! - A small fixture entity and proptest strategies for it
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use placebook_testing::{InMemoryRemote, SnapshotRecorder, fixtures::Note};
//!
//! #[tokio::test]
//! async fn fetch_emits_backend_content() {
//!     let remote = InMemoryRemote::new(vec![Note::new("p1", "cabin")]);
//!     let store = DomainStore::new(remote.clone(), SyncConfig::default());
//!     let recorder = SnapshotRecorder::new();
//!     let _subscription = store.subscribe(recorder.listener());
//!
//!     store.fetch_all().await.unwrap();
//!     assert_eq!(recorder.len(), 2);
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Given-When-Then harness for reducers
pub mod reducer_test;

/// Mock implementations of remote collaborators
pub mod mocks;

/// Test entity used across the workspace's store tests
pub mod fixtures {
    use placebook_core::Entity;

    /// Minimal entity: an id and a line of text
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Note {
        /// Backend id
        pub id: String,
        /// Payload
        pub text: String,
    }

    impl Note {
        /// Create a note
        #[must_use]
        pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
            Self {
                id: id.into(),
                text: text.into(),
            }
        }
    }

    impl Entity for Note {
        type Id = String;
        type Draft = String;

        fn id(&self) -> &String {
            &self.id
        }

        fn from_draft(id: String, text: String) -> Self {
            Self { id, text }
        }

        fn provisional_id(sequence: u64) -> String {
            format!("pending-{sequence}")
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use super::fixtures::Note;
    use proptest::collection::{btree_map, vec};
    use proptest::prelude::*;

    /// Notes with distinct ids, in arbitrary order
    pub fn notes(max: usize) -> impl Strategy<Value = Vec<Note>> {
        btree_map("[a-z][a-z0-9]{0,5}", "[a-zA-Z ]{0,12}", 0..=max)
            .prop_map(|entries| {
                entries
                    .into_iter()
                    .map(|(id, text)| Note::new(id, text))
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    }

    /// A short script of local mutations over a small id space
    pub fn local_ops(len: usize) -> impl Strategy<Value = Vec<LocalOp>> {
        let op = prop_oneof![
            ("[a-d]", "[a-z]{1,4}").prop_map(|(id, text)| LocalOp::Upsert(Note::new(id, text))),
            "[a-d]".prop_map(LocalOp::Remove),
            notes(4).prop_map(LocalOp::ReplaceAll),
        ];
        vec(op, 0..=len)
    }

    /// One local mutation
    #[derive(Clone, Debug)]
    pub enum LocalOp {
        /// Insert or replace
        Upsert(Note),
        /// Remove by id
        Remove(String),
        /// Replace everything
        ReplaceAll(Vec<Note>),
    }
}

/// Captures every snapshot delivered to a listener
///
/// # Example
///
/// ```
/// use placebook_testing::SnapshotRecorder;
///
/// let recorder = SnapshotRecorder::new();
/// let listener = recorder.listener();
/// listener(&1_u32);
/// listener(&2_u32);
/// assert_eq!(recorder.snapshots(), vec![1, 2]);
/// ```
#[derive(Debug)]
pub struct SnapshotRecorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for SnapshotRecorder<T> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<T> Default for SnapshotRecorder<T> {
    fn default() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> SnapshotRecorder<T> {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that appends every snapshot it receives
    #[must_use]
    pub fn listener(&self) -> impl Fn(&T) + Send + Sync + 'static + use<T> {
        let seen = Arc::clone(&self.seen);
        move |snapshot: &T| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(snapshot.clone());
        }
    }

    /// Everything received so far, oldest first
    #[must_use]
    pub fn snapshots(&self) -> Vec<T> {
        self.lock().clone()
    }

    /// Number of snapshots received
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was received
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The most recent snapshot
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Install a test-friendly tracing subscriber; repeated calls are harmless
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("placebook=debug")),
        )
        .with_test_writer()
        .try_init()
        .ok();
}

// Re-export commonly used items
pub use mocks::{InMemoryRemote, RemoteCall};
pub use reducer_test::ReducerTest;
