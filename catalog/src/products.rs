//! Product Store: the session's list of catalog products.
//!
//! Every backend operation goes through three phases. The command sets
//! `loading`, the reducer returns an effect calling the
//! [`ProductRepository`], and the effect settles into a fulfilled or
//! rejected action that the reducer applies. Nothing is written to
//! `products` before the backend has confirmed.
//!
//! Backend commands carry a [`RequestId`] that their settlement echoes.

use crate::repository::ProductRepository;
use crate::types::{Product, ProductDraft, ProductId, RequestId};
use shopkeep_core::{effect::Effect, environment::Clock, reducer::Reducer, settle, smallvec, SmallVec};
use shopkeep_macros::Action;
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Product Store state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductState {
    /// Products in display order
    pub products: Vec<Product>,
    /// A request is in flight
    pub loading: bool,
    /// Message of the last rejection, cleared by the next fulfilled one
    pub error: Option<String>,
    /// Highest millisecond handed out as an id, including creates still in flight
    last_assigned: Option<i64>,
}

impl ProductState {
    /// State holding `products`, nothing in flight
    #[must_use]
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products,
            ..Self::default()
        }
    }

    /// Looks up a product by id
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    /// Whether a product with this id is loaded
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.product(id).is_some()
    }

    /// Reserve a timestamp-derived id for a new product
    ///
    /// Never reuses a millisecond already handed out by this store, nor one a
    /// loaded product uses, so creates racing in the same millisecond get
    /// distinct ids before either has settled.
    pub fn assign_id(&mut self, clock: &dyn Clock) -> ProductId {
        let mut millis = clock.now().timestamp_millis();
        if let Some(last) = self.last_assigned {
            millis = millis.max(last + 1);
        }
        while self.contains(&ProductId::from_millis(millis)) {
            millis += 1;
        }
        self.last_assigned = Some(millis);
        ProductId::from_millis(millis)
    }

    fn upsert(&mut self, product: Product) {
        match self.products.iter_mut().find(|p| p.id == product.id) {
            Some(slot) => *slot = product,
            None => self.products.push(product),
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the Product Store
#[derive(Action, Clone, Debug, PartialEq)]
#[action(slice = "products")]
pub enum ProductAction {
    // Commands
    /// Replace the list with the backend's
    #[command]
    FetchAll {
        /// Echoed by the settlement
        request_id: RequestId,
    },

    /// Refresh or load one product
    #[command]
    FetchById {
        /// Product to fetch
        id: ProductId,
        /// Echoed by the settlement
        request_id: RequestId,
    },

    /// Validate, assign an id and persist a new product
    #[command]
    Create {
        /// What the user entered
        draft: ProductDraft,
        /// Echoed by the settlement
        request_id: RequestId,
    },

    /// Persist a full replacement of a product
    #[command]
    UpdateById {
        /// Product to replace
        id: ProductId,
        /// New contents
        product: Product,
        /// Echoed by the settlement
        request_id: RequestId,
    },

    /// Delete a product
    #[command]
    DeleteById {
        /// Product to delete
        id: ProductId,
        /// Echoed by the settlement
        request_id: RequestId,
    },

    // Local-only
    /// Append without a backend call
    AddLocal {
        /// Product to append
        product: Product,
    },

    /// Remove every product with this id without a backend call
    RemoveLocal {
        /// Product to remove
        id: ProductId,
    },

    // Settlements
    /// `FetchAll` fulfilled
    #[fulfilled]
    ProductsLoaded {
        /// Backend list
        products: Vec<Product>,
        /// Request that loaded it
        request_id: RequestId,
    },

    /// `FetchById` fulfilled
    #[fulfilled]
    ProductLoaded {
        /// Backend record
        product: Product,
        /// Request that loaded it
        request_id: RequestId,
    },

    /// `Create` fulfilled
    #[fulfilled]
    ProductCreated {
        /// Record echoed by the backend
        product: Product,
        /// Request that created it
        request_id: RequestId,
    },

    /// `UpdateById` fulfilled
    #[fulfilled]
    ProductUpdated {
        /// Id the update was sent for
        id: ProductId,
        /// Record echoed by the backend
        product: Product,
        /// Request that updated it
        request_id: RequestId,
    },

    /// `DeleteById` fulfilled
    #[fulfilled]
    ProductDeleted {
        /// Deleted product
        id: ProductId,
        /// Request that deleted it
        request_id: RequestId,
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

impl ProductAction {
    /// `FetchAll` with a fresh request id
    #[must_use]
    pub fn fetch_all() -> Self {
        Self::FetchAll {
            request_id: RequestId::new(),
        }
    }

    /// `FetchById` with a fresh request id
    #[must_use]
    pub fn fetch_by_id(id: ProductId) -> Self {
        Self::FetchById {
            id,
            request_id: RequestId::new(),
        }
    }

    /// `Create` with a fresh request id
    #[must_use]
    pub fn create(draft: ProductDraft) -> Self {
        Self::Create {
            draft,
            request_id: RequestId::new(),
        }
    }

    /// `UpdateById` with a fresh request id
    #[must_use]
    pub fn update_by_id(id: ProductId, product: Product) -> Self {
        Self::UpdateById {
            id,
            product,
            request_id: RequestId::new(),
        }
    }

    /// `DeleteById` with a fresh request id
    #[must_use]
    pub fn delete_by_id(id: ProductId) -> Self {
        Self::DeleteById {
            id,
            request_id: RequestId::new(),
        }
    }

    /// Request id carried by a backend command or its settlement
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::FetchAll { request_id }
            | Self::FetchById { request_id, .. }
            | Self::Create { request_id, .. }
            | Self::UpdateById { request_id, .. }
            | Self::DeleteById { request_id, .. }
            | Self::ProductsLoaded { request_id, .. }
            | Self::ProductLoaded { request_id, .. }
            | Self::ProductCreated { request_id, .. }
            | Self::ProductUpdated { request_id, .. }
            | Self::ProductDeleted { request_id, .. }
            | Self::Failed { request_id, .. } => Some(*request_id),
            Self::AddLocal { .. } | Self::RemoveLocal { .. } => None,
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

/// Environment dependencies for the Product Store
#[derive(Clone)]
pub struct ProductEnvironment {
    /// Products service
    pub repository: Arc<dyn ProductRepository>,
    /// Clock for id assignment
    pub clock: Arc<dyn Clock>,
}

impl ProductEnvironment {
    /// Creates a new `ProductEnvironment`
    #[must_use]
    pub fn new(repository: Arc<dyn ProductRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the Product Store
#[derive(Clone, Debug, Default)]
pub struct ProductReducer;

impl ProductReducer {
    /// Creates a new `ProductReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Settles immediately as rejected, without touching the backend
    fn reject(request: &'static str, request_id: RequestId, error: String) -> Effect<ProductAction> {
        Effect::Future(Box::pin(async move {
            Some(ProductAction::Failed {
                request,
                request_id,
                error,
            })
        }))
    }

    fn fulfilled(state: &mut ProductState) {
        state.loading = false;
        state.error = None;
    }
}

impl Reducer for ProductReducer {
    type State = ProductState;
    type Action = ProductAction;
    type Environment = ProductEnvironment;

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
            ProductAction::FetchAll { request_id } => {
                state.loading = true;
                smallvec![settle! {
                    call: env.repository.list(),
                    on_success: |products| ProductAction::ProductsLoaded { products, request_id },
                    on_error: |error| ProductAction::Failed { request, request_id, error: error.to_string() }
                }]
            },

            ProductAction::FetchById { id, request_id } => {
                state.loading = true;
                smallvec![settle! {
                    call: env.repository.get(&id),
                    on_success: |product| ProductAction::ProductLoaded { product, request_id },
                    on_error: |error| ProductAction::Failed { request, request_id, error: error.to_string() }
                }]
            },

            ProductAction::Create { draft, request_id } => {
                if let Err(error) = draft.validate() {
                    return smallvec![Self::reject(request, request_id, error.to_string())];
                }

                let product = draft.into_product(state.assign_id(env.clock.as_ref()));
                tracing::debug!(id = %product.id, "Creating product");
                state.loading = true;
                smallvec![settle! {
                    call: env.repository.create(product),
                    on_success: |product| ProductAction::ProductCreated { product, request_id },
                    on_error: |error| ProductAction::Failed { request, request_id, error: error.to_string() }
                }]
            },

            ProductAction::UpdateById {
                id,
                product,
                request_id,
            } => {
                state.loading = true;
                let updated_id = id.clone();
                smallvec![settle! {
                    call: env.repository.update(&id, product),
                    on_success: |product| ProductAction::ProductUpdated { id: updated_id, product, request_id },
                    on_error: |error| ProductAction::Failed { request, request_id, error: error.to_string() }
                }]
            },

            ProductAction::DeleteById { id, request_id } => {
                state.loading = true;
                let deleted_id = id.clone();
                smallvec![settle! {
                    call: env.repository.delete(&id),
                    on_success: |()| ProductAction::ProductDeleted { id: deleted_id, request_id },
                    on_error: |error| ProductAction::Failed { request, request_id, error: error.to_string() }
                }]
            },

            // ========== Local-only ==========
            ProductAction::AddLocal { product } => {
                state.products.push(product);
                SmallVec::new()
            },

            ProductAction::RemoveLocal { id } => {
                state.products.retain(|p| p.id != id);
                SmallVec::new()
            },

            // ========== Settlements ==========
            ProductAction::ProductsLoaded { products, .. } => {
                Self::fulfilled(state);
                state.products = products;
                SmallVec::new()
            },

            ProductAction::ProductLoaded { product, .. }
            | ProductAction::ProductCreated { product, .. } => {
                Self::fulfilled(state);
                state.upsert(product);
                SmallVec::new()
            },

            ProductAction::ProductUpdated { id, product, .. } => {
                Self::fulfilled(state);
                if let Some(slot) = state.products.iter_mut().find(|p| p.id == id) {
                    *slot = product;
                }
                SmallVec::new()
            },

            ProductAction::ProductDeleted { id, .. } => {
                Self::fulfilled(state);
                state.products.retain(|p| p.id != id);
                SmallVec::new()
            },

            ProductAction::Failed {
                request,
                request_id,
                error,
            } => {
                tracing::warn!(request, %request_id, %error, "Product request rejected");
                state.loading = false;
                state.error = Some(error);
                SmallVec::new()
            },
        }
    }
}
