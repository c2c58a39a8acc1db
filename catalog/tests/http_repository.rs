//! HTTP repository clients against a mock server

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)] // Test code can use unwrap/expect

use serde_json::json;
use shopkeep_catalog::repository::{
    CartRepository, HttpCartRepository, HttpProductRepository, ProductRepository,
};
use shopkeep_catalog::{CartItem, Product, ProductId, RepositoryError};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn lamp() -> Product {
    Product {
        id: ProductId::new("1735689600000"),
        name: "Lamp".to_string(),
        price: 12.5,
        image: "data:image/png;base64,AAAA".to_string(),
        description: "Desk lamp".to_string(),
        quantity: 3,
    }
}

#[tokio::test]
async fn test_list_products_coerces_text_numbers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "name": "Lamp", "price": "12.5", "image": "a.png", "description": "", "quantity": "3"},
            {"id": "2", "name": "Mug", "price": null, "image": "b.png", "description": ""}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let repo = HttpProductRepository::new(&format!("{}/products", server.uri()));
    let products = repo.list().await.unwrap();

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].price, 12.5);
    assert_eq!(products[0].quantity, 3);
    assert_eq!(products[1].price, 0.0);
    assert_eq!(products[1].quantity, 0);
}

#[tokio::test]
async fn test_create_posts_full_product() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products"))
        .and(body_json(serde_json::to_value(lamp()).unwrap()))
        .respond_with(ResponseTemplate::new(201).set_body_json(lamp()))
        .expect(1)
        .mount(&server)
        .await;

    let repo = HttpProductRepository::new(&format!("{}/products", server.uri()));
    let created = repo.create(lamp()).await.unwrap();

    assert_eq!(created, lamp());
}

#[tokio::test]
async fn test_update_puts_to_item_path() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/products/1735689600000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lamp()))
        .expect(1)
        .mount(&server)
        .await;

    let repo = HttpProductRepository::new(&format!("{}/products/", server.uri()));
    let updated = repo.update(&lamp().id, lamp()).await.unwrap();

    assert_eq!(updated.name, "Lamp");
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/products/1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let repo = HttpProductRepository::new(&format!("{}/products", server.uri()));
    repo.delete(&ProductId::new("1")).await.unwrap();
}

#[tokio::test]
async fn test_missing_product_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let repo = HttpProductRepository::new(&format!("{}/products", server.uri()));
    let error = repo.get(&ProductId::new("404")).await.unwrap_err();

    assert!(error.is_not_found());
    assert_eq!(error.to_string(), "Backend error (status 404): Not Found");
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let repo = HttpProductRepository::new(&format!("{}/products", server.uri()));
    let error = repo.list().await.unwrap_err();

    assert!(matches!(error, RepositoryError::ResponseParseFailed(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_request_error() {
    let server = MockServer::start().await;
    let url = format!("{}/cart", server.uri());
    drop(server);

    let repo = HttpCartRepository::new(&url);
    let error = repo.list().await.unwrap_err();

    assert!(matches!(error, RepositoryError::RequestFailed(_)));
}

#[tokio::test]
async fn test_cart_line_is_sent_flat() {
    let server = MockServer::start().await;
    let mut wire = serde_json::to_value(lamp()).unwrap();
    wire["quantity"] = json!(2);

    Mock::given(method("PUT"))
        .and(path("/cart/1735689600000"))
        .and(body_json(wire.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(wire))
        .expect(1)
        .mount(&server)
        .await;

    let repo = HttpCartRepository::new(&format!("{}/cart", server.uri()));
    let item = CartItem::new(lamp(), 2);
    let saved = repo.update(item.id(), item.clone()).await.unwrap();

    assert_eq!(saved.quantity, 2);
    assert_eq!(saved.product.name, "Lamp");
}

#[tokio::test]
async fn test_cart_get_reads_quantity_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cart/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "name": "Mug", "price": "4", "image": "", "description": "", "quantity": "5"
        })))
        .mount(&server)
        .await;

    let repo = HttpCartRepository::new(&format!("{}/cart", server.uri()));
    let item = repo.get(&ProductId::new("7")).await.unwrap();

    assert_eq!(item.id().as_str(), "7");
    assert_eq!(item.line_total(), 20.0);
}
