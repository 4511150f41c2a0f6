//! # Placebook Core
//!
//! Core traits and types for Placebook domain stores.
//!
//! This crate holds the pure half of the architecture: the reducer contract,
//! effect descriptions, and the synced-collection feature that every entity
//! store (places, bookings) is built from. Nothing here performs I/O on its
//! own; the runtime crate executes the effects a reducer returns.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature, observable through snapshots
//! - **Action**: All possible inputs to a reducer (local mutations, remote requests, remote outcomes)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use placebook_core::sync::{SyncAction, SyncEnvironment, SyncReducer, SyncState};
//!
//! let env = SyncEnvironment::new(remote, SyncConfig::default());
//! let mut state = SyncState::<Place>::new();
//!
//! // Local mutation: no effects
//! let effects = SyncReducer::new().reduce(&mut state, SyncAction::ReplaceAll(vec![]), &env);
//! assert!(effects.is_empty());
//! ```

pub use smallvec::{SmallVec, smallvec};

/// Entity collections and their snapshots
pub mod collection;

/// Error taxonomy shared by every store and remote collaborator
pub mod error;

/// Synced collection feature: state, actions and reducer for remote-backed stores
pub mod sync;

/// State module - observable state contract
///
/// The runtime emits a snapshot of the state to subscribers whenever the
/// state's revision moves after a reduction.
pub mod state {
    /// State that can be observed through immutable snapshots
    ///
    /// # Example
    ///
    /// ```
    /// use placebook_core::state::Observable;
    ///
    /// #[derive(Default)]
    /// struct Counter {
    ///     value: u64,
    /// }
    ///
    /// impl Observable for Counter {
    ///     type Snapshot = u64;
    ///
    ///     fn revision(&self) -> u64 {
    ///         self.value
    ///     }
    ///
    ///     fn snapshot(&self) -> u64 {
    ///         self.value
    ///     }
    /// }
    ///
    /// assert_eq!(Counter::default().snapshot(), 0);
    /// ```
    pub trait Observable {
        /// Immutable view handed to subscribers
        type Snapshot: Clone + Send + Sync + 'static;

        /// Monotonic counter, bumped by every mutation that changes the snapshot
        fn revision(&self) -> u64;

        /// Build a snapshot of the current state
        fn snapshot(&self) -> Self::Snapshot;
    }
}

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for BookingsReducer {
    ///     type State = BookingsState;
    ///     type Action = BookingsAction;
    ///     type Environment = BookingsEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut BookingsState,
    ///         action: BookingsAction,
    ///         env: &BookingsEnvironment,
    ///     ) -> SmallVec<[Effect<BookingsAction>; 4]> {
    ///         match action {
    ///             BookingsAction::Clear => {
    ///                 state.bookings.clear();
    ///                 SmallVec::new()
    ///             }
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Updates state in place
        /// 2. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// The effects to be executed by the runtime (usually zero or one)
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently; produced actions are reduced as they arrive
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Wrap an async computation that may feed an action back
        pub fn future<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Whether executing this effect does nothing
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
                },
                Effect::Future(_) => false,
            }
        }
    }
}

// Re-export commonly used types
pub use collection::{Collection, Entity, Snapshot};
pub use effect::Effect;
pub use error::SyncError;
pub use reducer::Reducer;
pub use state::Observable;
