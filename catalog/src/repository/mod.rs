//! Repository clients for the products and cart services.
//!
//! Each operation maps to one HTTP verb and path:
//!
//! | Operation | Verb | Path |
//! |---|---|---|
//! | `list` | GET | `/` |
//! | `get` | GET | `/{id}` |
//! | `create` | POST | `/` |
//! | `update` | PUT | `/{id}` |
//! | `delete` | DELETE | `/{id}` |
//!
//! Clients hold no local state and never retry. Stores reach them through
//! their environment as `Arc<dyn …>`, so tests swap in [`crate::mocks`].

use crate::error::RepositoryError;
use crate::types::{CartItem, Product, ProductId};
use futures::future::BoxFuture;

pub mod http;

pub use http::{HttpCartRepository, HttpProductRepository};

/// Repository result
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Future returned by repository operations
///
/// Owned (`'static`) so effects can move it into a spawned task.
pub type RepositoryFuture<T> = BoxFuture<'static, RepositoryResult<T>>;

/// Products service
pub trait ProductRepository: Send + Sync {
    /// Fetch every product
    fn list(&self) -> RepositoryFuture<Vec<Product>>;

    /// Fetch one product
    fn get(&self, id: &ProductId) -> RepositoryFuture<Product>;

    /// Persist a new product and return the stored record
    fn create(&self, product: Product) -> RepositoryFuture<Product>;

    /// Replace a product and return the stored record
    fn update(&self, id: &ProductId, product: Product) -> RepositoryFuture<Product>;

    /// Delete a product
    fn delete(&self, id: &ProductId) -> RepositoryFuture<()>;
}

/// Cart service
pub trait CartRepository: Send + Sync {
    /// Fetch every cart line
    fn list(&self) -> RepositoryFuture<Vec<CartItem>>;

    /// Fetch one cart line
    fn get(&self, id: &ProductId) -> RepositoryFuture<CartItem>;

    /// Persist a new cart line and return the stored record
    fn create(&self, item: CartItem) -> RepositoryFuture<CartItem>;

    /// Replace a cart line and return the stored record
    fn update(&self, id: &ProductId, item: CartItem) -> RepositoryFuture<CartItem>;

    /// Delete a cart line
    fn delete(&self, id: &ProductId) -> RepositoryFuture<()>;
}
