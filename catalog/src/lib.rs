//! # Shopkeep Catalog
//!
//! Client-side state for a product catalog and a shopping cart, kept in sync
//! with two REST services.
//!
//! - [`products`]: the Product Store (list, create, update, delete)
//! - [`cart`]: the Cart Store (add, decrement, remove, total)
//! - [`repository`]: clients for the `/products` and `/cart` services
//! - [`session`]: one of each store, plus request/response helpers
//! - [`mocks`]: in-memory services for tests and offline runs
//!
//! ## Example
//!
//! ```ignore
//! use shopkeep_catalog::{config::CatalogConfig, session::CatalogSession};
//!
//! let session = CatalogSession::from_config(&CatalogConfig::from_env());
//! session.hydrate().await?;
//!
//! let lamp = session.product_state().await.products[0].clone();
//! session.add_to_cart(lamp).await?;
//! println!("total: {}", session.cart_total().await);
//! ```

pub mod cart;
pub mod config;
pub mod error;
pub mod mocks;
pub mod products;
pub mod repository;
pub mod session;
pub mod types;

pub use error::{DraftError, RepositoryError, SessionError};
pub use types::{CartItem, Product, ProductDraft, ProductId, RequestId};
