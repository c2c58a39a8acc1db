//! Cart Store: the lines in the user's cart.
//!
//! The reducer reads the current lines to decide between create and update
//! (or update and delete), then persists the locally computed line. The
//! backend's echo is not used; the line is applied once the call succeeds.
//! At most one line exists per product id, and a line whose quantity would
//! reach zero is deleted instead of saved.

use crate::repository::CartRepository;
use crate::types::{CartItem, Product, ProductId, RequestId};
use shopkeep_core::{effect::Effect, reducer::Reducer, settle, smallvec, SmallVec};
use shopkeep_macros::Action;
use std::sync::Arc;

/// Rejection message for a decrement on a product that is not in the cart
pub const NOT_IN_CART: &str = "Product not found in the cart";

// ============================================================================
// State
// ============================================================================

/// Cart Store state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartState {
    /// Cart lines in the order they were added
    pub cart_items: Vec<CartItem>,
    /// A request is in flight
    pub loading: bool,
    /// Message of the last rejection, cleared by the next fulfilled one
    pub error: Option<String>,
}

impl CartState {
    /// Sum of `price × quantity` over every line
    ///
    /// Computed on each call. Missing prices and quantities were decoded as 0.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cart_items.iter().map(CartItem::line_total).sum()
    }

    /// The line for a product
    #[must_use]
    pub fn item(&self, id: &ProductId) -> Option<&CartItem> {
        self.cart_items.iter().find(|item| item.id() == id)
    }

    /// Number of units across all lines
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.cart_items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    fn upsert(&mut self, item: CartItem) {
        match self.cart_items.iter_mut().find(|line| line.id() == item.id()) {
            Some(slot) => *slot = item,
            None => self.cart_items.push(item),
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the Cart Store
#[derive(Action, Clone, Debug, PartialEq)]
#[action(slice = "cart")]
pub enum CartAction {
    // Commands
    /// Replace the lines with the backend's
    #[command]
    FetchAll {
        /// Echoed by the settlement
        request_id: RequestId,
    },

    /// Add one unit, creating the line if needed
    #[command]
    AddOrIncrement {
        /// Product to add
        product: Product,
        /// Echoed by the settlement
        request_id: RequestId,
    },

    /// Remove one unit, deleting the line at quantity 1
    #[command]
    DecrementOrRemove {
        /// Product to decrement
        id: ProductId,
        /// Echoed by the settlement
        request_id: RequestId,
    },

    /// Delete the line whatever its quantity, then re-fetch
    #[command]
    RemoveEntirely {
        /// Product to remove
        id: ProductId,
        /// Echoed by the settlement
        request_id: RequestId,
    },

    // Local-only
    /// Empty the cart without a backend call
    Clear,

    // Settlements
    /// `FetchAll` fulfilled
    #[fulfilled]
    ItemsLoaded {
        /// Backend lines
        items: Vec<CartItem>,
        /// Request that loaded them
        request_id: RequestId,
    },

    /// A line was created or updated
    #[fulfilled]
    ItemSaved {
        /// The line as computed before saving
        item: CartItem,
        /// Request that saved it
        request_id: RequestId,
    },

    /// A line was deleted by `DecrementOrRemove`
    #[fulfilled]
    ItemRemoved {
        /// Removed product
        id: ProductId,
        /// Request that removed it
        request_id: RequestId,
    },

    /// `RemoveEntirely` succeeded; the cart is re-fetched
    #[fulfilled]
    RemovalConfirmed {
        /// Removed product
        id: ProductId,
        /// Request that removed it
        request_id: RequestId,
        /// Request id of the re-fetch this starts
        refetch: RequestId,
    },

    /// Any command rejected
    #[rejected]
    Failed {
        /// `action_type()` of the command that failed
        request: &'static str,
        /// Request that failed
        request_id: RequestId,
        /// Human-readable reason
        error: String,
    },
}

impl CartAction {
    /// `FetchAll` with a fresh request id
    #[must_use]
    pub fn fetch_all() -> Self {
        Self::FetchAll {
            request_id: RequestId::new(),
        }
    }

    /// `AddOrIncrement` with a fresh request id
    #[must_use]
    pub fn add_or_increment(product: Product) -> Self {
        Self::AddOrIncrement {
            product,
            request_id: RequestId::new(),
        }
    }

    /// `DecrementOrRemove` with a fresh request id
    #[must_use]
    pub fn decrement_or_remove(id: ProductId) -> Self {
        Self::DecrementOrRemove {
            id,
            request_id: RequestId::new(),
        }
    }

    /// `RemoveEntirely` with a fresh request id
    #[must_use]
    pub fn remove_entirely(id: ProductId) -> Self {
        Self::RemoveEntirely {
            id,
            request_id: RequestId::new(),
        }
    }

    /// Request id carried by a backend command or its settlement
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::FetchAll { request_id }
            | Self::AddOrIncrement { request_id, .. }
            | Self::DecrementOrRemove { request_id, .. }
            | Self::RemoveEntirely { request_id, .. }
            | Self::ItemsLoaded { request_id, .. }
            | Self::ItemSaved { request_id, .. }
            | Self::ItemRemoved { request_id, .. }
            | Self::RemovalConfirmed { request_id, .. }
            | Self::Failed { request_id, .. } => Some(*request_id),
            Self::Clear => None,
        }
    }

    /// Whether this is the settlement of request `id`
    #[must_use]
    pub fn settles(&self, id: RequestId) -> bool {
        self.is_settlement() && self.request_id() == Some(id)
    }

    /// Whether this is the rejection of the command named `request`
    #[must_use]
    pub fn rejects(&self, request: &str) -> bool {
        matches!(self, Self::Failed { request: failed, .. } if *failed == request)
    }

    /// Rejection message, if this is a rejection
    #[must_use]
    pub fn rejection(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the Cart Store
#[derive(Clone)]
pub struct CartEnvironment {
    /// Cart service
    pub repository: Arc<dyn CartRepository>,
}

impl CartEnvironment {
    /// Creates a new `CartEnvironment`
    #[must_use]
    pub fn new(repository: Arc<dyn CartRepository>) -> Self {
        Self { repository }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the Cart Store
#[derive(Clone, Debug, Default)]
pub struct CartReducer;

impl CartReducer {
    /// Creates a new `CartReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch_all(
        state: &mut CartState,
        request_id: RequestId,
        env: &CartEnvironment,
    ) -> Effect<CartAction> {
        state.loading = true;
        let request = CartAction::FetchAll { request_id }.action_type();
        settle! {
            call: env.repository.list(),
            on_success: |items| CartAction::ItemsLoaded { items, request_id },
            on_error: |error| CartAction::Failed { request, request_id, error: error.to_string() }
        }
    }

    /// Persist `item`, creating the line or replacing the existing one
    fn save(
        request: &'static str,
        request_id: RequestId,
        item: CartItem,
        exists: bool,
        env: &CartEnvironment,
    ) -> Effect<CartAction> {
        let call = if exists {
            env.repository.update(item.id(), item.clone())
        } else {
            env.repository.create(item.clone())
        };
        settle! {
            call: call,
            on_success: |_echo| CartAction::ItemSaved { item, request_id },
            on_error: |error| CartAction::Failed { request, request_id, error: error.to_string() }
        }
    }
}

impl Reducer for CartReducer {
    type State = CartState;
    type Action = CartAction;
    type Environment = CartEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let request = action.action_type();
        if action.is_command() {
            tracing::debug!(action = request, "Dispatching");
        }

        match action {
            // ========== Commands ==========
            CartAction::FetchAll { request_id } => {
                smallvec![Self::fetch_all(state, request_id, env)]
            },

            CartAction::AddOrIncrement {
                product,
                request_id,
            } => {
                let (item, exists) = match state.item(&product.id) {
                    Some(line) => (line.with_quantity(line.quantity.saturating_add(1)), true),
                    None => (CartItem::new(product, 1), false),
                };
                tracing::debug!(id = %item.id(), quantity = item.quantity, "Growing cart line");
                state.loading = true;
                smallvec![Self::save(request, request_id, item, exists, env)]
            },

            CartAction::DecrementOrRemove { id, request_id } => {
                let Some(line) = state.item(&id) else {
                    return smallvec![Effect::Future(Box::pin(async move {
                        Some(CartAction::Failed {
                            request,
                            request_id,
                            error: NOT_IN_CART.to_string(),
                        })
                    }))];
                };

                if line.quantity > 1 {
                    let item = line.with_quantity(line.quantity - 1);
                    state.loading = true;
                    smallvec![Self::save(request, request_id, item, true, env)]
                } else {
                    state.loading = true;
                    let removed = id.clone();
                    smallvec![settle! {
                        call: env.repository.delete(&id),
                        on_success: |()| CartAction::ItemRemoved { id: removed, request_id },
                        on_error: |error| CartAction::Failed { request, request_id, error: error.to_string() }
                    }]
                }
            },

            CartAction::RemoveEntirely { id, request_id } => {
                state.loading = true;
                let removed = id.clone();
                let refetch = RequestId::new();
                smallvec![settle! {
                    call: env.repository.delete(&id),
                    on_success: |()| CartAction::RemovalConfirmed { id: removed, request_id, refetch },
                    on_error: |error| CartAction::Failed { request, request_id, error: error.to_string() }
                }]
            },

            // ========== Local-only ==========
            CartAction::Clear => {
                state.cart_items.clear();
                SmallVec::new()
            },

            // ========== Settlements ==========
            CartAction::ItemsLoaded { items, .. } => {
                state.loading = false;
                state.error = None;
                state.cart_items = items;
                SmallVec::new()
            },

            CartAction::ItemSaved { item, .. } => {
                state.loading = false;
                state.error = None;
                state.upsert(item);
                SmallVec::new()
            },

            CartAction::ItemRemoved { id, .. } => {
                state.loading = false;
                state.error = None;
                state.cart_items.retain(|item| *item.id() != id);
                SmallVec::new()
            },

            // Local lines are left alone; the re-fetch reconciles them.
            CartAction::RemovalConfirmed { id, refetch, .. } => {
                tracing::debug!(%id, "Removal confirmed, re-fetching cart");
                state.error = None;
                smallvec![Self::fetch_all(state, refetch, env)]
            },

            CartAction::Failed {
                request,
                request_id,
                error,
            } => {
                tracing::warn!(request, %request_id, %error, "Cart request rejected");
                state.loading = false;
                state.error = Some(error);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::mocks::InMemoryCartRepository;
    use shopkeep_testing::{assertions, settle_effects, ReducerTest};

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price,
            image: "img.png".to_string(),
            description: String::new(),
            quantity: 50,
        }
    }

    fn line(id: &str, price: f64, quantity: u32) -> CartItem {
        CartItem::new(product(id, price), quantity)
    }

    fn env_with(repository: Arc<InMemoryCartRepository>) -> CartEnvironment {
        CartEnvironment::new(repository)
    }

    fn create_test_env() -> CartEnvironment {
        env_with(InMemoryCartRepository::shared())
    }

    fn cart(items: Vec<CartItem>) -> CartState {
        CartState {
            cart_items: items,
            ..CartState::default()
        }
    }

    #[test]
    fn test_total() {
        let state = cart(vec![line("a", 10.0, 2), line("b", 5.0, 1)]);
        assert_eq!(state.total(), 25.0);
        assert_eq!(state.item_count(), 3);
        assert_eq!(CartState::default().total(), 0.0);
    }

    #[test]
    fn test_total_tolerates_zeroed_fields() {
        let state = cart(vec![line("a", 0.0, 4), line("b", 3.0, 0)]);
        assert_eq!(state.total(), 0.0);
    }

    #[test]
    fn test_clear_is_local() {
        ReducerTest::new(CartReducer::new())
            .with_env(create_test_env())
            .given_state(cart(vec![line("a", 1.0, 1)]))
            .when_action(CartAction::Clear)
            .then_state(|state| assert!(state.cart_items.is_empty()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_item_saved_replaces_in_place() {
        ReducerTest::new(CartReducer::new())
            .with_env(create_test_env())
            .given_state(CartState {
                cart_items: vec![line("a", 1.0, 1), line("b", 2.0, 1)],
                loading: true,
                error: Some("stale".to_string()),
            })
            .when_action(CartAction::ItemSaved {
                item: line("a", 1.0, 2),
                request_id: RequestId::new(),
            })
            .then_state(|state| {
                assert_eq!(state.cart_items[0].quantity, 2);
                assert_eq!(state.cart_items.len(), 2);
                assert!(!state.loading);
                assert!(state.error.is_none());
            })
            .run();
    }

    #[test]
    fn test_item_saved_appends_new_line() {
        ReducerTest::new(CartReducer::new())
            .with_env(create_test_env())
            .given_state(cart(vec![line("a", 1.0, 1)]))
            .when_action(CartAction::ItemSaved {
                item: line("b", 2.0, 1),
                request_id: RequestId::new(),
            })
            .then_state(|state| assert_eq!(state.cart_items[1].id().as_str(), "b"))
            .run();
    }

    #[test]
    fn test_removal_confirmed_refetches() {
        ReducerTest::new(CartReducer::new())
            .with_env(create_test_env())
            .given_state(CartState {
                cart_items: vec![line("a", 1.0, 3)],
                loading: false,
                error: Some("old".to_string()),
            })
            .when_action(CartAction::RemovalConfirmed {
                id: ProductId::new("a"),
                request_id: RequestId::new(),
                refetch: RequestId::new(),
            })
            .then_state(|state| {
                assert_eq!(state.cart_items.len(), 1);
                assert!(state.loading);
                assert!(state.error.is_none());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[tokio::test]
    async fn test_remove_entirely_settles_to_confirmation() {
        let repository = Arc::new(InMemoryCartRepository::with_records(vec![line("a", 1.0, 3)]));
        let command = CartAction::remove_entirely(ProductId::new("a"));
        let request_id = command.request_id().unwrap();

        ReducerTest::new(CartReducer::new())
            .with_env(env_with(repository))
            .given_state(cart(vec![line("a", 1.0, 3)]))
            .when_action(command)
            .then_state(|state| {
                assert!(state.loading);
                assert_eq!(state.cart_items.len(), 1);
            })
            .then_effects(assertions::assert_has_future_effect)
            .then_settlements(move |settled| {
                assert_eq!(settled.len(), 1);
                assert!(settled[0].settles(request_id));
                assert!(matches!(
                    &settled[0],
                    CartAction::RemovalConfirmed { id, refetch, .. }
                        if id.as_str() == "a" && *refetch != request_id
                ));
            })
            .run_settled()
            .await;
    }

    #[tokio::test]
    async fn test_refetch_settles_under_its_own_id() {
        let repository = Arc::new(InMemoryCartRepository::with_records(vec![line("b", 1.0, 1)]));
        let refetch = RequestId::new();

        ReducerTest::new(CartReducer::new())
            .with_env(env_with(repository))
            .given_state(cart(vec![line("a", 1.0, 3), line("b", 1.0, 1)]))
            .when_action(CartAction::RemovalConfirmed {
                id: ProductId::new("a"),
                request_id: RequestId::new(),
                refetch,
            })
            .then_settlements(move |settled| {
                assert!(settled[0].settles(refetch));
                assert_eq!(settled[0].action_type(), "cart/ItemsLoaded");
            })
            .run_settled()
            .await;
    }

    #[tokio::test]
    async fn test_add_creates_then_increments() {
        let repository = InMemoryCartRepository::shared();
        let env = env_with(Arc::clone(&repository));
        let reducer = CartReducer::new();
        let mut state = CartState::default();

        for expected in 1..=3 {
            let effects = reducer.reduce(
                &mut state,
                CartAction::add_or_increment(product("a", 4.0)),
                &env,
            );
            for action in settle_effects(effects).await {
                reducer.reduce(&mut state, action, &env);
            }
            assert_eq!(state.cart_items.len(), 1);
            assert_eq!(state.cart_items[0].quantity, expected);
        }

        assert_eq!(repository.records()[0].quantity, 3);
        assert_eq!(state.total(), 12.0);
    }

    #[tokio::test]
    async fn test_decrement_absent_id_is_rejected_locally() {
        let repository = InMemoryCartRepository::shared();
        let env = env_with(Arc::clone(&repository));
        let mut state = cart(vec![line("a", 1.0, 1)]);
        let command = CartAction::decrement_or_remove(ProductId::new("zzz"));
        let request_id = command.request_id().unwrap();

        let effects = CartReducer::new().reduce(&mut state, command, &env);

        let settled = settle_effects(effects).await;
        assert!(settled[0].rejects("cart/DecrementOrRemove"));
        assert!(settled[0].settles(request_id));
        assert_eq!(settled[0].rejection(), Some(NOT_IN_CART));
        assert_eq!(repository.calls(), 0);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_decrement_last_unit_deletes() {
        let repository = InMemoryCartRepository::with_records(vec![line("a", 1.0, 1)]);
        let repository = Arc::new(repository);
        let env = env_with(Arc::clone(&repository));
        let reducer = CartReducer::new();
        let mut state = cart(vec![line("a", 1.0, 1), line("b", 1.0, 2)]);

        let command = CartAction::decrement_or_remove(ProductId::new("a"));
        let request_id = command.request_id().unwrap();
        let effects = reducer.reduce(&mut state, command, &env);
        for action in settle_effects(effects).await {
            assert_eq!(
                action,
                CartAction::ItemRemoved {
                    id: ProductId::new("a"),
                    request_id
                }
            );
            reducer.reduce(&mut state, action, &env);
        }

        assert_eq!(state.cart_items, vec![line("b", 1.0, 2)]);
        assert!(repository.records().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_leaves_line() {
        let repository = InMemoryCartRepository::with_records(vec![line("a", 1.0, 2)]);
        repository.set_offline(true);
        let env = env_with(Arc::new(repository));
        let reducer = CartReducer::new();
        let mut state = cart(vec![line("a", 1.0, 2)]);

        let effects = reducer.reduce(
            &mut state,
            CartAction::add_or_increment(product("a", 1.0)),
            &env,
        );
        for action in settle_effects(effects).await {
            reducer.reduce(&mut state, action, &env);
        }

        assert_eq!(state.cart_items[0].quantity, 2);
        assert_eq!(
            state.error.as_deref(),
            Some("Request failed: connection refused")
        );
        assert!(!state.loading);
    }
}
