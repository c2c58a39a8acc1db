//! Configuration management for the catalog.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Catalog configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the products resource
    pub products_url: String,
    /// Base URL of the cart resource
    pub cart_url: String,
    /// How long session helpers wait for a request to settle, in seconds
    pub settle_timeout_secs: u64,
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl CatalogConfig {
    /// Load configuration from environment variables
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SHOPKEEP_PRODUCTS_URL` | `http://localhost:5000/products` |
    /// | `SHOPKEEP_CART_URL` | `http://localhost:5001/cart` |
    /// | `SHOPKEEP_SETTLE_TIMEOUT_SECS` | `30` |
    /// | `SHOPKEEP_LOG` (used when `RUST_LOG` is unset) | `shopkeep=info,shopkeep_catalog=info` |
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            products_url: env::var("SHOPKEEP_PRODUCTS_URL").unwrap_or(defaults.products_url),
            cart_url: env::var("SHOPKEEP_CART_URL").unwrap_or(defaults.cart_url),
            settle_timeout_secs: env::var("SHOPKEEP_SETTLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.settle_timeout_secs),
            log_filter: env::var("SHOPKEEP_LOG").unwrap_or(defaults.log_filter),
        }
    }

    /// Settle timeout as a [`Duration`]
    #[must_use]
    pub const fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            products_url: "http://localhost:5000/products".to_string(),
            cart_url: "http://localhost:5001/cart".to_string(),
            settle_timeout_secs: 30,
            log_filter: "shopkeep=info,shopkeep_catalog=info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.products_url, "http://localhost:5000/products");
        assert_eq!(config.cart_url, "http://localhost:5001/cart");
        assert_eq!(config.settle_timeout(), Duration::from_secs(30));
    }
}
