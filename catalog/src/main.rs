//! Shopkeep catalog client.
//!
//! Hydrates a session from the configured products and cart services and
//! logs what it finds. Every action the stores reduce is logged at debug
//! level, the way a view would observe them.

use shopkeep_catalog::cart::CartAction;
use shopkeep_catalog::config::CatalogConfig;
use shopkeep_catalog::products::ProductAction;
use shopkeep_catalog::session::CatalogSession;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log every action a store publishes until it closes
async fn observe<A: Clone>(mut rx: broadcast::Receiver<A>, describe: fn(&A) -> &'static str) {
    loop {
        match rx.recv().await {
            Ok(action) => debug!(action = describe(&action), "Store updated"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Observer lagged");
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = CatalogConfig::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        products_url = %config.products_url,
        cart_url = %config.cart_url,
        settle_timeout_secs = config.settle_timeout_secs,
        "Configuration loaded"
    );

    let session = CatalogSession::from_config(&config);
    tokio::spawn(observe(session.subscribe_products(), ProductAction::action_type));
    tokio::spawn(observe(session.subscribe_cart(), CartAction::action_type));

    if let Err(error) = session.hydrate().await {
        warn!(%error, "Hydration incomplete");
    }

    let products = session.product_state().await;
    let cart = session.cart_state().await;

    for product in &products.products {
        info!(id = %product.id, name = %product.name, price = product.price, "Product");
    }
    for item in &cart.cart_items {
        info!(
            id = %item.id(),
            name = %item.product.name,
            quantity = item.quantity,
            line_total = item.line_total(),
            "Cart line"
        );
    }

    info!(
        products = products.products.len(),
        cart_lines = cart.cart_items.len(),
        cart_units = cart.item_count(),
        cart_total = cart.total(),
        products_error = products.error.as_deref().unwrap_or("none"),
        cart_error = cart.error.as_deref().unwrap_or("none"),
        "Session ready"
    );

    session.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}
