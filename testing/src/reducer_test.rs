//! Given-When-Then harness for reducers.
//!
//! A [`ReducerTest`] reduces the given actions, then the action under test,
//! and hands the resulting state and effects to the `then_*` checks. A
//! settled test also runs the effects to completion and reduces every action
//! they feed back, the way a store would, so a remote request and its outcome
//! can be checked together without a runtime.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use placebook_core::{Effect, Reducer};

type Check<T> = Box<dyn FnOnce(&T)>;
type SliceCheck<T> = Box<dyn FnOnce(&[T])>;

/// Reducer test built step by step
///
/// # Example
///
/// ```ignore
/// use placebook_testing::{InMemoryRemote, ReducerTest};
///
/// ReducerTest::new(SyncReducer::new())
///     .with_env(SyncEnvironment::new(InMemoryRemote::new(vec![]), SyncConfig::default()))
///     .given_state(SyncState::new())
///     .when_action(SyncAction::Add("Cabin".into()))
///     .settled()
///     .then_feedback(|actions| assert!(matches!(actions, [SyncAction::Added { .. }])))
///     .then_state(|state| assert_eq!(state.pending_count(), 0))
///     .run();
/// ```
pub struct ReducerTest<R: Reducer> {
    reducer: R,
    environment: Option<R::Environment>,
    state: Option<R::State>,
    given: Vec<R::Action>,
    when: Option<R::Action>,
    settle: bool,
    state_checks: Vec<Check<R::State>>,
    effect_checks: Vec<SliceCheck<Effect<R::Action>>>,
    feedback_checks: Vec<SliceCheck<R::Action>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
    R::Action: Clone,
{
    /// Start a test of `reducer`
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            state: None,
            given: Vec::new(),
            when: None,
            settle: false,
            state_checks: Vec::new(),
            effect_checks: Vec::new(),
            feedback_checks: Vec::new(),
        }
    }

    /// Environment passed to every reduction
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// State before anything is reduced (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.state = Some(state);
        self
    }

    /// Actions reduced before the one under test; their effects are dropped (Given)
    #[must_use]
    pub fn given_actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = R::Action>,
    {
        self.given.extend(actions);
        self
    }

    /// The action under test (When)
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.when = Some(action);
        self
    }

    /// Run the effects of the action under test and reduce what they feed back
    #[must_use]
    pub const fn settled(mut self) -> Self {
        self.settle = true;
        self
    }

    /// Check the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_checks.push(Box::new(check));
        self
    }

    /// Check the effects returned for the action under test (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[Effect<R::Action>]) + 'static,
    {
        self.effect_checks.push(Box::new(check));
        self
    }

    /// Check the actions fed back by a settled test, in the order reduced (Then)
    #[must_use]
    pub fn then_feedback<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[R::Action]) + 'static,
    {
        self.feedback_checks.push(Box::new(check));
        self
    }

    /// Reduce everything, run the checks and return the final state
    ///
    /// # Panics
    ///
    /// Panics when the environment, state or action under test is missing,
    /// when feedback is checked on a test that was not settled, or when a
    /// check fails.
    #[allow(clippy::expect_used, clippy::panic)] // Test harness
    pub fn run(self) -> R::State {
        let Self {
            reducer,
            environment,
            state,
            given,
            when,
            settle,
            state_checks,
            effect_checks,
            feedback_checks,
        } = self;

        let env = environment.expect("with_env() was not called");
        let mut state = state.expect("given_state() was not called");
        let action = when.expect("when_action() was not called");
        assert!(
            settle || feedback_checks.is_empty(),
            "then_feedback() needs settled()"
        );

        for action in given {
            reducer.reduce(&mut state, action, &env);
        }
        let effects = reducer.reduce(&mut state, action, &env).into_vec();
        for check in effect_checks {
            check(&effects);
        }

        if settle {
            let mut fed_back = Vec::new();
            for effect in effects {
                drive(&reducer, &mut state, &env, effect, &mut fed_back);
            }
            for check in feedback_checks {
                check(&fed_back);
            }
        }

        for check in state_checks {
            check(&state);
        }
        state
    }
}

/// Run one effect to completion, reducing every action it produces
fn drive<R>(
    reducer: &R,
    state: &mut R::State,
    env: &R::Environment,
    effect: Effect<R::Action>,
    fed_back: &mut Vec<R::Action>,
) where
    R: Reducer,
    R::Action: Clone,
{
    match effect {
        Effect::None => {},
        Effect::Parallel(effects) | Effect::Sequential(effects) => {
            for effect in effects {
                drive(reducer, state, env, effect, fed_back);
            }
        },
        Effect::Future(future) => {
            let Some(action) = tokio_test::block_on(future) else {
                return;
            };
            fed_back.push(action.clone());
            for effect in reducer.reduce(state, action, env) {
                drive(reducer, state, env, effect, fed_back);
            }
        },
    }
}

/// Checks for the effects of a single reduction
pub mod assertions {
    use placebook_core::Effect;

    /// The reduction asked for no work
    ///
    /// # Panics
    ///
    /// Panics when any effect other than `Effect::None` was returned.
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "expected no effects, got {effects:?}"
        );
    }

    /// The reduction issued exactly one remote request
    ///
    /// # Panics
    ///
    /// Panics unless `effects` is a single `Effect::Future`.
    pub fn assert_one_request<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            matches!(effects, [Effect::Future(_)]),
            "expected one request, got {effects:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Note;
    use crate::mocks::InMemoryRemote;
    use placebook_core::sync::{SyncAction, SyncConfig, SyncEnvironment, SyncReducer, SyncState};

    fn env() -> SyncEnvironment<Note> {
        SyncEnvironment::new(InMemoryRemote::new(vec![Note::new("a", "x")]), SyncConfig::default())
    }

    #[test]
    fn unsettled_test_leaves_effects_unrun() {
        ReducerTest::new(SyncReducer::new())
            .with_env(env())
            .given_state(SyncState::new())
            .when_action(SyncAction::FetchAll)
            .then_effects(assertions::assert_one_request)
            .then_state(|state| assert!(!state.collection().is_loaded()))
            .run();
    }

    #[test]
    fn settled_test_reduces_the_outcome() {
        let state = ReducerTest::new(SyncReducer::new())
            .with_env(env())
            .given_state(SyncState::new())
            .when_action(SyncAction::FetchAll)
            .settled()
            .then_feedback(|actions| assert!(matches!(actions, [SyncAction::Fetched(_)])))
            .run();

        assert_eq!(state.collection().items(), &[Note::new("a", "x")]);
    }

    #[test]
    #[should_panic(expected = "then_feedback() needs settled()")]
    fn feedback_without_settling_is_rejected() {
        ReducerTest::new(SyncReducer::new())
            .with_env(env())
            .given_state(SyncState::new())
            .when_action(SyncAction::FetchAll)
            .then_feedback(|_| {})
            .run();
    }

    #[test]
    fn no_effects_accepts_explicit_none() {
        assertions::assert_no_effects::<()>(&[Effect::None]);
        assertions::assert_no_effects::<()>(&[]);
    }
}
