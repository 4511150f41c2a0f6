//! # Placebook Runtime
//!
//! Runtime implementation for Placebook domain stores.
//!
//! This crate provides the Store runtime that coordinates reducer execution,
//! effect handling and snapshot emission.
//!
//! ## Core Components
//!
//! - **Store**: Owns the state, runs the reducer and executes effects
//! - **Observers**: Replay-latest fan-out of snapshots to listeners and streams
//! - **`DomainStore`**: The synced-collection store used for every entity type
//!
//! ## Example
//!
//! ```ignore
//! use placebook_runtime::DomainStore;
//!
//! let places = DomainStore::new(remote, SyncConfig::default());
//!
//! let _subscription = places.subscribe(|snapshot| {
//!     println!("{} places", snapshot.len());
//! });
//!
//! places.fetch_all().await?;
//! ```

use placebook_core::state::Observable;
use placebook_core::{Effect, Reducer, SmallVec};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Domain store facade over the synced-collection reducer
pub mod domain;

/// Metrics emitted by stores
pub mod metrics;

/// Snapshot fan-out to listeners and streams
pub mod subscription;

pub use domain::DomainStore;
pub use error::StoreError;
pub use store::Store;
pub use subscription::{SnapshotStream, Subscription};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// No action produced by the effects matched the awaited predicate
        ///
        /// Returned by `send_and_wait_for` when every effect has completed
        /// without feeding back the action the caller was waiting for.
        #[error("Effects completed without producing the awaited action")]
        NoMatchingAction,
    }
}

/// Store module - the runtime for reducers
pub mod store {
    use super::{Arc, Effect, Mutex, MutexGuard, Observable, PoisonError, Reducer, SmallVec};
    use crate::error::StoreError;
    use crate::metrics::StoreMetrics;
    use crate::subscription::{Observers, SnapshotStream, Subscription};
    use futures::future::{BoxFuture, join_all};
    use std::time::Instant;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind a `Mutex`; reductions are short and never await)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. Snapshot emission to subscribers
    ///
    /// After every reduction that moves the state's revision, the new
    /// snapshot is published before `dispatch` returns. Emissions are ordered
    /// by revision.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        S: Observable,
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<Mutex<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        observers: Arc<Observers<S::Snapshot>>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        S: Observable,
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                observers: Arc::clone(&self.observers),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        S: Observable + Send + 'static,
        A: Clone + Send + 'static,
        E: Send + Sync + 'static,
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            let observers = Observers::new(initial_state.snapshot(), initial_state.revision());
            Self {
                state: Arc::new(Mutex::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                observers: Arc::new(observers),
            }
        }

        /// The most recently published snapshot
        #[must_use]
        pub fn snapshot(&self) -> S::Snapshot {
            self.observers.latest()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let pending = store.state(|s| s.pending_count());
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            f(&*self.lock())
        }

        /// Attach a listener; it is called immediately with the latest snapshot
        pub fn subscribe<F>(&self, listener: F) -> Subscription
        where
            F: Fn(&S::Snapshot) + Send + Sync + 'static,
        {
            self.observers.subscribe(listener)
        }

        /// Stream of snapshots, starting with the latest one
        #[must_use]
        pub fn stream(&self) -> SnapshotStream<S::Snapshot> {
            self.observers.stream()
        }

        /// Number of attached listeners
        #[must_use]
        pub fn subscriber_count(&self) -> usize {
            self.observers.listener_count()
        }

        /// Reduce an action and publish the resulting snapshot
        ///
        /// Returns the effects the reducer asked for without running them.
        /// Subscribers have been notified by the time this returns.
        #[must_use = "effects returned by the reducer are not executed by dispatch"]
        pub fn dispatch(&self, action: A) -> SmallVec<[Effect<A>; 4]> {
            let start = Instant::now();
            let (effects, emission) = {
                let mut state = self.lock();
                let before = state.revision();
                let effects = self.reducer.reduce(&mut *state, action, &*self.environment);
                let after = state.revision();
                tracing::trace!(before, after, effects = effects.len(), "Reducer completed");
                (effects, (after != before).then(|| (after, state.snapshot())))
            };
            StoreMetrics::record_action(start.elapsed());

            // Listeners run without the state lock held so they may read the store
            if let Some((revision, snapshot)) = emission {
                self.observers.emit(revision, snapshot);
            }
            effects
        }

        /// Send an action and run its effects to completion
        ///
        /// Actions fed back by effects are reduced as they arrive, and their
        /// own effects are run too. Returns every fed-back action in the
        /// order it was reduced. Parallel effects run concurrently; their
        /// actions are listed in declaration order.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Vec<A> {
            let effects = self.dispatch(action);
            let mut trail = Vec::new();
            for effect in effects {
                trail.extend(self.execute(effect).await);
            }
            trail
        }

        /// Send an action and return the first fed-back action matching `predicate`
        ///
        /// Designed for request-response use: send a request action and wait
        /// for its outcome action.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::NoMatchingAction`] when the effects complete
        /// without producing a matching action.
        ///
        /// # Example
        ///
        /// ```ignore
        /// let outcome = store
        ///     .send_and_wait_for(SyncAction::FetchAll, SyncAction::is_outcome)
        ///     .await?;
        /// ```
        pub async fn send_and_wait_for<F>(&self, action: A, predicate: F) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            self.send(action)
                .await
                .into_iter()
                .find(|action| predicate(action))
                .ok_or(StoreError::NoMatchingAction)
        }

        fn execute(&self, effect: Effect<A>) -> BoxFuture<'_, Vec<A>> {
            Box::pin(async move {
                match effect {
                    Effect::None => Vec::new(),
                    Effect::Future(future) => {
                        let Some(action) = future.await else {
                            tracing::trace!("Effect::Future completed with no action");
                            return Vec::new();
                        };
                        let effects = self.dispatch(action.clone());
                        let mut trail = vec![action];
                        for effect in effects {
                            trail.extend(self.execute(effect).await);
                        }
                        trail
                    },
                    Effect::Parallel(effects) => {
                        tracing::trace!(count = effects.len(), "Executing Effect::Parallel");
                        join_all(effects.into_iter().map(|effect| self.execute(effect)))
                            .await
                            .into_iter()
                            .flatten()
                            .collect()
                    },
                    Effect::Sequential(effects) => {
                        tracing::trace!(count = effects.len(), "Executing Effect::Sequential");
                        let mut trail = Vec::new();
                        for effect in effects {
                            trail.extend(self.execute(effect).await);
                        }
                        trail
                    },
                }
            })
        }

        fn lock(&self) -> MutexGuard<'_, S> {
            // A panicking listener must not brick the store
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placebook_core::smallvec;
    use std::sync::Mutex as StdMutex;

    // Test state
    #[derive(Debug, Clone, Default)]
    struct TestState {
        value: i32,
        revision: u64,
    }

    impl Observable for TestState {
        type Snapshot = i32;

        fn revision(&self) -> u64 {
            self.revision
        }

        fn snapshot(&self) -> i32 {
            self.value
        }
    }

    // Test action
    #[derive(Debug, Clone, PartialEq)]
    enum TestAction {
        Increment,
        Decrement,
        NoOp,
        ProduceEffect,
        ProduceParallelEffects,
        ProduceSequentialEffects,
    }

    // Test reducer
    #[derive(Debug, Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.value += 1;
                    state.revision += 1;
                    SmallVec::new()
                },
                TestAction::Decrement => {
                    state.value -= 1;
                    state.revision += 1;
                    SmallVec::new()
                },
                TestAction::NoOp => smallvec![Effect::None],
                TestAction::ProduceEffect => {
                    smallvec![Effect::future(async { Some(TestAction::Increment) })]
                },
                TestAction::ProduceParallelEffects => smallvec![Effect::merge(vec![
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Increment) }),
                ])],
                TestAction::ProduceSequentialEffects => smallvec![Effect::chain(vec![
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Decrement) }),
                ])],
            }
        }
    }

    type TestStore = Store<TestState, TestAction, (), TestReducer>;

    fn store() -> TestStore {
        Store::new(TestState::default(), TestReducer, ())
    }

    fn recorder(store: &TestStore) -> (Arc<StdMutex<Vec<i32>>>, Subscription) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = store.subscribe(move |value| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(*value);
            }
        });
        (seen, subscription)
    }

    fn seen(values: &Arc<StdMutex<Vec<i32>>>) -> Vec<i32> {
        values.lock().map(|v| v.clone()).unwrap_or_default()
    }

    #[tokio::test]
    async fn send_reduces_action() {
        let store = store();
        let trail = store.send(TestAction::Increment).await;

        assert!(trail.is_empty());
        assert_eq!(store.state(|s| s.value), 1);
        assert_eq!(store.snapshot(), 1);
    }

    #[tokio::test]
    async fn effect_feeds_action_back() {
        let store = store();
        let trail = store.send(TestAction::ProduceEffect).await;

        assert_eq!(trail, vec![TestAction::Increment]);
        assert_eq!(store.state(|s| s.value), 1);
    }

    #[tokio::test]
    async fn parallel_effects_all_complete() {
        let store = store();
        let trail = store.send(TestAction::ProduceParallelEffects).await;

        assert_eq!(trail.len(), 3);
        assert_eq!(store.state(|s| s.value), 3);
    }

    #[tokio::test]
    async fn sequential_effects_run_in_order() {
        let store = store();
        let (values, _subscription) = recorder(&store);

        let trail = store.send(TestAction::ProduceSequentialEffects).await;

        assert_eq!(
            trail,
            vec![TestAction::Increment, TestAction::Increment, TestAction::Decrement]
        );
        assert_eq!(seen(&values), vec![0, 1, 2, 1]);
    }

    #[test]
    fn dispatch_without_revision_change_does_not_emit() {
        let store = store();
        let (values, _subscription) = recorder(&store);

        let effects = store.dispatch(TestAction::NoOp);

        assert_eq!(effects.len(), 1);
        assert_eq!(seen(&values), vec![0]);
    }

    #[test]
    fn listener_may_read_store_during_emission() {
        let store = store();
        let reader = store.clone();
        let observed = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        let _subscription = store.subscribe(move |_| {
            if let Ok(mut observed) = sink.lock() {
                observed.push(reader.state(|s| s.value));
            }
        });

        let _ = store.dispatch(TestAction::Increment);

        assert_eq!(observed.lock().map(|v| v.clone()).unwrap_or_default(), vec![0, 1]);
    }

    #[tokio::test]
    async fn send_and_wait_for_finds_matching_action() {
        let store = store();
        let result = store
            .send_and_wait_for(TestAction::ProduceEffect, |a| *a == TestAction::Increment)
            .await;
        assert_eq!(result, Ok(TestAction::Increment));
    }

    #[tokio::test]
    async fn send_and_wait_for_reports_missing_action() {
        let store = store();
        let result = store
            .send_and_wait_for(TestAction::Increment, |a| *a == TestAction::Decrement)
            .await;
        assert_eq!(result, Err(StoreError::NoMatchingAction));
    }

    #[test]
    fn subscriber_count_tracks_handles() {
        let store = store();
        let (_values, mut subscription) = recorder(&store);
        assert_eq!(store.subscriber_count(), 1);
        subscription.detach();
        assert_eq!(store.subscriber_count(), 0);
    }
}
