//! Catalog session: one Product Store and one Cart Store for a user session.
//!
//! The stores never return errors to their callers. A rejected request lands
//! in the store's `error` field and is published like any other action.
//! [`CatalogSession`] wraps the flows a view performs (create a product,
//! add to cart and refresh, ...) and waits for each request to settle, so
//! callers get a `Result` as well.
//!
//! Waiting is bounded by `settle_timeout`. Giving up only stops the wait;
//! the request keeps running and still settles into the store.

use crate::cart::{CartAction, CartEnvironment, CartReducer, CartState};
use crate::config::CatalogConfig;
use crate::error::SessionError;
use crate::products::{ProductAction, ProductEnvironment, ProductReducer, ProductState};
use crate::repository::{CartRepository, HttpCartRepository, HttpProductRepository, ProductRepository};
use crate::types::{CartItem, Product, ProductDraft, ProductId, RequestId};
use shopkeep_core::environment::{Clock, SystemClock};
use shopkeep_core::reducer::Reducer;
use shopkeep_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Store holding the product list
pub type ProductStore = Store<ProductState, ProductAction, ProductEnvironment, ProductReducer>;

/// Store holding the cart lines
pub type CartStore = Store<CartState, CartAction, CartEnvironment, CartReducer>;

/// Settlements the session waits on
trait Settlement {
    fn rejection(&self) -> Option<&str>;
    fn request_id(&self) -> Option<RequestId>;
    fn is_settlement(&self) -> bool;
}

impl Settlement for ProductAction {
    fn rejection(&self) -> Option<&str> {
        Self::rejection(self)
    }

    fn request_id(&self) -> Option<RequestId> {
        Self::request_id(self)
    }

    fn is_settlement(&self) -> bool {
        Self::is_settlement(self)
    }
}

impl Settlement for CartAction {
    fn rejection(&self) -> Option<&str> {
        Self::rejection(self)
    }

    fn request_id(&self) -> Option<RequestId> {
        Self::request_id(self)
    }

    fn is_settlement(&self) -> bool {
        Self::is_settlement(self)
    }
}

fn into_result<A: Settlement>(settled: A) -> Result<A, SessionError> {
    match settled.rejection() {
        Some(error) => Err(SessionError::Rejected(error.to_string())),
        None => Ok(settled),
    }
}

fn settles<A: Settlement>(action: &A, request_id: RequestId) -> bool {
    action.is_settlement() && action.request_id() == Some(request_id)
}

/// Send `action` and wait for its own settlement
///
/// Matching is by request id, so a concurrent request of the same kind
/// never stands in for this one. Local-only actions are sent without
/// waiting.
async fn dispatch<S, A, E, R>(
    store: &Store<S, A, E, R>,
    action: A,
    timeout: Duration,
) -> Result<A, SessionError>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Settlement + Clone + Send + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let Some(request_id) = action.request_id() else {
        store.send(action.clone()).await?;
        return Ok(action);
    };
    let settled = store
        .send_and_wait_for(action, |a| settles(a, request_id), timeout)
        .await?;
    into_result(settled)
}

/// Next action on `rx` accepted by `accept`, within `timeout`
async fn next_matching<A, F>(
    rx: &mut broadcast::Receiver<A>,
    mut accept: F,
    timeout: Duration,
) -> Result<A, StoreError>
where
    A: Clone,
    F: FnMut(&A) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(action) if accept(&action) => return Ok(action),
                Ok(_) => {},
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session observer lagged");
                },
                Err(broadcast::error::RecvError::Closed) => return Err(StoreError::ChannelClosed),
            }
        }
    })
    .await
    .map_err(|_| StoreError::Timeout)?
}

/// A user session over the products and cart services
#[derive(Clone)]
pub struct CatalogSession {
    products: ProductStore,
    cart: CartStore,
    settle_timeout: Duration,
}

impl CatalogSession {
    /// Session over the given repositories
    #[must_use]
    pub fn new(
        products: Arc<dyn ProductRepository>,
        cart: Arc<dyn CartRepository>,
        clock: Arc<dyn Clock>,
        settle_timeout: Duration,
    ) -> Self {
        Self {
            products: Store::new(
                ProductState::default(),
                ProductReducer::new(),
                ProductEnvironment::new(products, clock),
            ),
            cart: Store::new(
                CartState::default(),
                CartReducer::new(),
                CartEnvironment::new(cart),
            ),
            settle_timeout,
        }
    }

    /// Session talking HTTP to the configured services
    #[must_use]
    pub fn from_config(config: &CatalogConfig) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            Arc::new(HttpProductRepository::with_client(client.clone(), &config.products_url)),
            Arc::new(HttpCartRepository::with_client(client, &config.cart_url)),
            Arc::new(SystemClock),
            config.settle_timeout(),
        )
    }

    /// The Product Store, for dispatching actions directly
    #[must_use]
    pub const fn products(&self) -> &ProductStore {
        &self.products
    }

    /// The Cart Store, for dispatching actions directly
    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Every action reduced by the Product Store, published after state changed
    #[must_use]
    pub fn subscribe_products(&self) -> broadcast::Receiver<ProductAction> {
        self.products.subscribe_actions()
    }

    /// Every action reduced by the Cart Store, published after state changed
    #[must_use]
    pub fn subscribe_cart(&self) -> broadcast::Receiver<CartAction> {
        self.cart.subscribe_actions()
    }

    /// Snapshot of the Product Store
    pub async fn product_state(&self) -> ProductState {
        self.products.state(Clone::clone).await
    }

    /// Snapshot of the Cart Store
    pub async fn cart_state(&self) -> CartState {
        self.cart.state(Clone::clone).await
    }

    /// Current cart total
    pub async fn cart_total(&self) -> f64 {
        self.cart.state(CartState::total).await
    }

    /// Initial load of both stores
    ///
    /// Both fetches run concurrently and both settle into their stores even
    /// if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure, products first.
    pub async fn hydrate(&self) -> Result<(), SessionError> {
        tracing::info!("Hydrating catalog session");
        let (products, cart) = futures::join!(self.fetch_products(), self.fetch_cart());
        products?;
        cart?;
        Ok(())
    }

    /// Reload the product list
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] if the products service failed, or a
    /// [`SessionError::Store`] if nothing settled in time.
    pub async fn fetch_products(&self) -> Result<Vec<Product>, SessionError> {
        dispatch(&self.products, ProductAction::fetch_all(), self.settle_timeout).await?;
        Ok(self.products.state(|s| s.products.clone()).await)
    }

    /// Reload the cart
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] if the cart service failed, or a
    /// [`SessionError::Store`] if nothing settled in time.
    pub async fn fetch_cart(&self) -> Result<Vec<CartItem>, SessionError> {
        dispatch(&self.cart, CartAction::fetch_all(), self.settle_timeout).await?;
        Ok(self.cart.state(|s| s.cart_items.clone()).await)
    }

    /// Create a product and return it as stored by the backend
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] if the draft is invalid or the backend
    /// refused it; the product is then not in the store.
    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product, SessionError> {
        let settled = dispatch(
            &self.products,
            ProductAction::create(draft),
            self.settle_timeout,
        )
        .await?;

        match settled {
            ProductAction::ProductCreated { product, .. } => {
                tracing::info!(id = %product.id, "Product created");
                Ok(product)
            },
            other => Err(SessionError::UnexpectedSettlement(other.action_type())),
        }
    }

    /// Save an edited product, then reload the list
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] if either request failed.
    pub async fn save_product(&self, id: ProductId, product: Product) -> Result<(), SessionError> {
        dispatch(
            &self.products,
            ProductAction::update_by_id(id, product),
            self.settle_timeout,
        )
        .await?;
        self.fetch_products().await.map(drop)
    }

    /// Delete a product, then reload the list
    ///
    /// The cart is not touched.
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] if either request failed, including a
    /// delete of a product the backend no longer has.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), SessionError> {
        dispatch(
            &self.products,
            ProductAction::delete_by_id(id),
            self.settle_timeout,
        )
        .await?;
        self.fetch_products().await.map(drop)
    }

    /// Add one unit of a product to the cart, then reload the cart
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] if either request failed.
    pub async fn add_to_cart(&self, product: Product) -> Result<(), SessionError> {
        dispatch(
            &self.cart,
            CartAction::add_or_increment(product),
            self.settle_timeout,
        )
        .await?;
        self.fetch_cart().await.map(drop)
    }

    /// Remove one unit of a product from the cart, then reload the cart
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] with "Product not found in the cart" if
    /// the product has no line, or if either request failed.
    pub async fn decrement(&self, id: ProductId) -> Result<(), SessionError> {
        dispatch(
            &self.cart,
            CartAction::decrement_or_remove(id),
            self.settle_timeout,
        )
        .await?;
        self.fetch_cart().await.map(drop)
    }

    /// Remove a product's line whatever its quantity
    ///
    /// Returns once the re-fetch that follows the delete has settled.
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] if the delete or the re-fetch failed.
    pub async fn remove_from_cart(&self, id: ProductId) -> Result<(), SessionError> {
        let request_id = RequestId::new();
        let action = CartAction::RemoveEntirely { id, request_id };

        let mut rx = self.cart.subscribe_actions();
        self.cart.send(action).await?;

        let settled =
            next_matching(&mut rx, |a| settles(a, request_id), self.settle_timeout).await?;
        let refetch = match into_result(settled)? {
            CartAction::RemovalConfirmed { refetch, .. } => refetch,
            other => return Err(SessionError::UnexpectedSettlement(other.action_type())),
        };

        let reloaded =
            next_matching(&mut rx, |a| settles(a, refetch), self.settle_timeout).await?;
        into_result(reloaded).map(drop)
    }

    /// Empty the cart locally; the cart service is not told
    ///
    /// # Errors
    ///
    /// [`SessionError::Store`] if the store is shutting down.
    pub async fn clear_cart(&self) -> Result<(), SessionError> {
        self.cart.send(CartAction::Clear).await?;
        Ok(())
    }

    /// Stop accepting actions and wait for in-flight requests
    ///
    /// # Errors
    ///
    /// [`SessionError::Store`] if requests were still running at `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), SessionError> {
        let (products, cart) = futures::join!(
            self.products.shutdown(timeout),
            self.cart.shutdown(timeout)
        );
        products?;
        cart?;
        Ok(())
    }
}

impl std::fmt::Debug for CatalogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSession")
            .field("settle_timeout", &self.settle_timeout)
            .finish_non_exhaustive()
    }
}
