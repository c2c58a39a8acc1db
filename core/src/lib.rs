//! # Shopkeep Core
//!
//! Core traits and types for the Shopkeep state architecture.
//!
//! Client-side state is held in stores that are only ever changed by running
//! a reducer over an action. Anything that talks to the outside world (the
//! products and cart services) is described as an [`effect::Effect`] and run
//! by the runtime, which feeds the settled result back in as another action.
//!
//! ## Core Concepts
//!
//! - **State**: The in-memory slice a store owns (products, cart lines)
//! - **Action**: Every input to a reducer, both caller commands and settlements
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: A description of async work, never executed by the reducer
//! - **Environment**: Injected dependencies (repository clients, clock)
//!
//! ## Example
//!
//! ```ignore
//! use shopkeep_core::*;
//!
//! impl Reducer for ProductReducer {
//!     type State = ProductState;
//!     type Action = ProductAction;
//!     type Environment = ProductEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut ProductState,
//!         action: ProductAction,
//!         env: &ProductEnvironment,
//!     ) -> SmallVec<[Effect<ProductAction>; 4]> {
//!         match action {
//!             ProductAction::FetchAll { request_id } => {
//!                 state.loading = true;
//!                 let repository = env.repository.clone();
//!                 smallvec![async_effect! {
//!                     Some(match repository.list().await {
//!                         Ok(products) => ProductAction::ProductsLoaded { products, request_id },
//!                         Err(error) => ProductAction::Failed {
//!                             request: "products/FetchAll",
//!                             request_id,
//!                             error: error.to_string(),
//!                         },
//!                     })
//!                 }]
//!             }
//!             _ => smallvec![Effect::None],
//!         }
//!     }
//! }
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Declarative macros for building effects
pub mod effect_macros;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They may read the current state (for example to find an existing cart line)
/// but never perform I/O themselves.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state slice this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// 1. Validates the action against current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed by the runtime
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
/// Effects are values returned from reducers. The runtime executes them and
/// feeds any produced action back into the same store.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Returns true if this effect does nothing
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Consume the effect and wait for the action it produces
        ///
        /// Useful outside a store, for example when a test wants to look at the
        /// settlement a reducer's effect would feed back.
        pub async fn into_action(self) -> Option<Action> {
            match self {
                Effect::None => None,
                Effect::Future(fut) => fut.await,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// External dependencies are abstracted behind traits and injected via the
/// Environment parameter, so reducers can be driven by fixed clocks and
/// in-memory repositories in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Product ids are derived from the creation timestamp, so the clock is
    /// what makes id assignment deterministic under test.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
