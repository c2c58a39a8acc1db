//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.
//! [`ReducerTest::run_settled`] also awaits the effects and checks what they settle into.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use crate::settle_effects;
use shopkeep_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Type alias for assertions on the actions effects settle into
type SettlementAssertion<A> = Box<dyn FnOnce(&[A])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use shopkeep_testing::{assertions, ReducerTest};
///
/// ReducerTest::new(CartReducer::new())
///     .with_env(test_environment())
///     .given_state(CartState::default())
///     .when_action(CartAction::Clear)
///     .then_state(|state| assert!(state.cart_items.is_empty()))
///     .then_effects(assertions::assert_no_future_effects)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    action: Option<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
    settlement_assertions: Vec<SettlementAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
            settlement_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the actions the effects settle into
    ///
    /// Only evaluated by [`ReducerTest::run_settled`].
    #[must_use]
    pub fn then_settlements<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[A]) + 'static,
    {
        self.settlement_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        // Execute reducer
        let effects = self.reducer.reduce(&mut state, action, &env);

        // Run state assertions
        for assertion in self.state_assertions {
            assertion(&state);
        }

        // Run effect assertions
        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }

    /// Run the test, then await every effect and assert on the settlements
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub async fn run_settled(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let effects = self.reducer.reduce(&mut state, action, &env);

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }

        // Run settlement assertions
        let settled = settle_effects(effects.into_vec()).await;
        for assertion in self.settlement_assertions {
            assertion(&settled);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use shopkeep_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that no effect sends a request
    ///
    /// # Panics
    ///
    /// Panics if any Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_future_effects<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no Future effects, but found at least one"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopkeep_core::{smallvec, SmallVec};

    #[derive(Clone, Debug, Default)]
    struct LineState {
        quantity: u32,
        saving: bool,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum LineAction {
        Add,
        Clear,
        Saved { quantity: u32 },
    }

    struct LineReducer;

    struct LineEnv {
        accept: bool,
    }

    impl Reducer for LineReducer {
        type State = LineState;
        type Action = LineAction;
        type Environment = LineEnv;

        fn reduce(
            &self,
            state: &mut LineState,
            action: LineAction,
            env: &LineEnv,
        ) -> SmallVec<[Effect<LineAction>; 4]> {
            match action {
                LineAction::Add => {
                    state.saving = true;
                    let quantity = state.quantity + 1;
                    let accept = env.accept;
                    smallvec![Effect::Future(Box::pin(async move {
                        accept.then_some(LineAction::Saved { quantity })
                    }))]
                },
                LineAction::Clear => {
                    state.quantity = 0;
                    SmallVec::new()
                },
                LineAction::Saved { quantity } => {
                    state.saving = false;
                    state.quantity = quantity;
                    smallvec![Effect::None]
                },
            }
        }
    }

    #[test]
    fn test_local_action() {
        ReducerTest::new(LineReducer)
            .with_env(LineEnv { accept: true })
            .given_state(LineState {
                quantity: 3,
                saving: false,
            })
            .when_action(LineAction::Clear)
            .then_state(|state| assert_eq!(state.quantity, 0))
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
                assertions::assert_no_future_effects(effects);
            })
            .run();
    }

    #[test]
    fn test_settlement_applies_quantity() {
        ReducerTest::new(LineReducer)
            .with_env(LineEnv { accept: true })
            .given_state(LineState {
                quantity: 1,
                saving: true,
            })
            .when_action(LineAction::Saved { quantity: 2 })
            .then_state(|state| {
                assert_eq!(state.quantity, 2);
                assert!(!state.saving);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[tokio::test]
    async fn test_request_settles() {
        ReducerTest::new(LineReducer)
            .with_env(LineEnv { accept: true })
            .given_state(LineState::default())
            .when_action(LineAction::Add)
            .then_state(|state| {
                assert!(state.saving);
                assert_eq!(state.quantity, 0);
            })
            .then_effects(assertions::assert_has_future_effect)
            .then_settlements(|settled| {
                assert_eq!(settled, [LineAction::Saved { quantity: 1 }]);
            })
            .run_settled()
            .await;
    }

    #[tokio::test]
    async fn test_effect_without_settlement() {
        ReducerTest::new(LineReducer)
            .with_env(LineEnv { accept: false })
            .given_state(LineState::default())
            .when_action(LineAction::Add)
            .then_settlements(|settled| assert!(settled.is_empty()))
            .run_settled()
            .await;
    }

    #[test]
    #[should_panic(expected = "Initial state must be set")]
    fn test_missing_state_panics() {
        ReducerTest::new(LineReducer)
            .with_env(LineEnv { accept: true })
            .when_action(LineAction::Clear)
            .run();
    }
}
