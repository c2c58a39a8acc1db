//! # Shopkeep Runtime
//!
//! Runtime implementation for the Shopkeep state architecture.
//!
//! A [`Store`] owns one slice of client state. Callers send it actions; the
//! reducer applies them and describes any backend request as an effect. The
//! store runs those requests and reduces whatever they settle into.
//!
//! ## Pieces
//!
//! - **Store**: Owns one state slice, runs the reducer and executes effects
//! - **Effect Executor**: Spawns effect futures and feeds settlements back
//! - **Action Broadcast**: Lets the view layer observe every reduced action
//!
//! ## Usage
//!
//! ```ignore
//! use shopkeep_runtime::Store;
//!
//! let store = Store::new(ProductState::default(), ProductReducer::new(), env);
//!
//! // Dispatch and wait for the request to settle
//! store.send(ProductAction::fetch_all()).await?.wait().await;
//!
//! let count = store.state(|s| s.products.len()).await;
//! ```

use shopkeep_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Store failures
pub mod error {
    use thiserror::Error;

    /// Why a store could not take or answer an action
    ///
    /// These never describe a failed repository call. Those settle into the
    /// store's own `error` field through the reducer.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// `send()` after `shutdown()` began
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Requests were still in flight when the shutdown deadline passed
        #[error("Shutdown timed out with {0} requests in flight")]
        ShutdownTimeout(usize),

        /// Nothing matching settled before the caller's deadline
        ///
        /// Only the wait is abandoned. The request keeps running.
        #[error("Timed out waiting for a settlement")]
        Timeout,

        /// Every sender of the action broadcast is gone
        #[error("Action broadcast closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Completion of the requests one action started
///
/// Returned by [`Store::send()`] to allow waiting for the effects of one
/// action to finish. An effect counts as finished once the action it produced
/// has been reduced, so after `wait()` returns the settlement is visible in
/// state.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(CartAction::fetch_all()).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // cart_items now reflect the backend
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    running: Arc<AtomicUsize>,
    drained: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let running = Arc::new(AtomicUsize::new(0));
        let (drained_tx, drained) = watch::channel(());

        (
            Self {
                running: Arc::clone(&running),
                drained,
            },
            EffectTracking {
                running,
                drained: drained_tx,
            },
        )
    }

    /// Handle for an action that started nothing
    #[must_use]
    pub fn completed() -> Self {
        let (drained_tx, drained) = watch::channel(());
        let _ = drained_tx.send(());

        Self {
            running: Arc::new(AtomicUsize::new(0)),
            drained,
        }
    }

    /// Requests from this action still in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait until every request from this action has settled
    pub async fn wait(&mut self) {
        while self.pending() > 0 {
            if self.drained.changed().await.is_err() {
                break;
            }
        }
    }

    /// [`EffectHandle::wait`] with a deadline
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] if requests are still in flight at `timeout`.
    /// They keep running.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Per-action count of requests in flight
#[derive(Clone)]
struct EffectTracking {
    running: Arc<AtomicUsize>,
    drained: watch::Sender<()>,
}

/// One request in flight, counted for its action and for its store
///
/// Dropping it counts the request as settled, even if the effect panicked.
struct InFlight {
    tracking: EffectTracking,
    store_pending: Arc<AtomicUsize>,
}

impl InFlight {
    fn start(tracking: EffectTracking, store_pending: &Arc<AtomicUsize>) -> Self {
        tracking.running.fetch_add(1, Ordering::SeqCst);
        store_pending.fetch_add(1, Ordering::SeqCst);
        Self {
            tracking,
            store_pending: Arc::clone(store_pending),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.store_pending.fetch_sub(1, Ordering::SeqCst);
        if self.tracking.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.tracking.drained.send(());
        }
    }
}

/// The store
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicUsize, Duration, Effect, EffectHandle, EffectTracking, InFlight,
        Ordering, Reducer, RwLock, StoreError,
    };
    use tokio::sync::broadcast;

    /// Default number of actions buffered for slow subscribers
    const DEFAULT_BROADCAST_CAPACITY: usize = 64;

    /// One state slice, its reducer and the requests it has in flight
    ///
    /// State sits behind an `RwLock` that only the reducer writes. The
    /// environment carries the repository clients and clock the reducer's
    /// effects use. Every reduced action is broadcast to subscribers.
    ///
    /// Cloning a store is cheap and every clone shares the same state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Every action is published here after the reducer has applied it.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Store with the default broadcast buffer
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Store whose broadcast buffers `capacity` actions per subscriber
        ///
        /// A subscriber that falls further behind gets `Lagged` and skips ahead.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }
        }

        /// Number of effects currently running across all actions
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Stop taking actions and let in-flight requests settle
        ///
        /// Requests are never cancelled. Their settlements are still reduced.
        ///
        /// # Errors
        ///
        /// [`StoreError::ShutdownTimeout`] if requests are still in flight at
        /// `timeout`.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Store shutting down");
            metrics::counter!("store.shutdown.initiated").increment(1);
            self.shutdown.store(true, Ordering::Release);

            let deadline = tokio::time::Instant::now() + timeout;
            let mut poll = tokio::time::interval(Duration::from_millis(20));

            loop {
                poll.tick().await;
                let pending = self.pending_effects();
                if pending == 0 {
                    tracing::info!("Store drained");
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    tracing::error!(pending, "Shutdown deadline passed with requests in flight");
                    return Err(StoreError::ShutdownTimeout(pending));
                }
            }
        }

        /// Reduce `action`, publish it and start the requests it describes
        ///
        /// Returns once the requests are started. Use the handle to wait for
        /// them. Concurrent sends are serialized at the reducer, but their
        /// requests race and the last settlement reduced wins.
        ///
        /// # Errors
        ///
        /// [`StoreError::ShutdownInProgress`] once `shutdown()` has begun.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);
            Ok(self.dispatch(action).await)
        }

        /// Reduce, publish and run effects
        ///
        /// Settlements come back through here rather than `send`, so requests
        /// already in flight still land in state during shutdown.
        async fn dispatch(&self, action: A) -> EffectHandle
        where
            R: Clone,
            E: Clone,
        {
            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let start = std::time::Instant::now();
                let effects = self
                    .reducer
                    .reduce(&mut *state, action.clone(), &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!(effects = effects.len(), "Reduced");

                // Publish under the write lock so subscribers see actions in
                // reduction order. No receivers is not an error.
                let _ = self.action_broadcast.send(action);
                effects
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            handle
        }

        /// Send an action and wait for a matching result action
        ///
        /// Designed for request-response callers: subscribe, send, then return
        /// the first broadcast action matching `predicate`.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: no matching action within `timeout`
        /// - [`StoreError::ChannelClosed`]: action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool,
        {
            // Subscribe BEFORE sending to avoid race condition
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to all actions from this store
        ///
        /// Each action is delivered after the reducer applied it, so a
        /// subscriber that reads state on receipt sees the new state.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let total = store.state(CartState::total).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Run one effect, reducing the action it settles into
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking)
        where
            R: Clone,
            E: Clone,
        {
            let Effect::Future(request) = effect else {
                metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                return;
            };

            metrics::counter!("store.effects.executed", "type" => "future").increment(1);
            let in_flight = InFlight::start(tracking, &self.pending_effects);
            let store = self.clone();

            tokio::spawn(async move {
                let _in_flight = in_flight;
                match request.await {
                    Some(settlement) => {
                        tracing::trace!("Request settled");
                        store.dispatch(settlement).await;
                    },
                    None => tracing::trace!("Effect finished without a settlement"),
                }
            });
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
