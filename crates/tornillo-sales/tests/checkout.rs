//! End-to-end checkout reconciliation against a wiremock sales API.

use rust_decimal::Decimal;
use serde_json::json;
use tornillo_core::{CartStore, CheckoutPayload, MemoryCartStorage, Product};
use tornillo_sales::{Reconciler, SalesClient, SalesError};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_cart(items: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "cartId": "c-1",
        "status": "OPEN",
        "items": items
    }))
}

fn local_cart() -> CartStore<MemoryCartStorage> {
    let mut cart = CartStore::new(MemoryCartStorage::new());
    cart.add(Product::new("p1", "Martillo", Decimal::from(10)), 2);
    cart.add(Product::new("p2", "Clavos", Decimal::from(5)), 1);
    cart
}

#[tokio::test]
async fn place_order_converges_server_cart_then_checks_out() {
    let server = MockServer::start().await;
    let stale = json!([
        {"productId": "p2", "quantity": 3},
        {"productId": "p3", "quantity": 1}
    ]);

    Mock::given(method("POST"))
        .and(path("/sales/cart"))
        .and(body_json(json!({"taxRate": 12})))
        .respond_with(server_cart(stale.clone()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sales/cart"))
        .respond_with(server_cart(stale))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/sales/cart/items"))
        .and(body_json(json!({"productId": "p2", "qty": 1})))
        .respond_with(server_cart(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sales/cart/items"))
        .and(body_json(json!({"productId": "p1", "qty": 2})))
        .respond_with(server_cart(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/sales/cart/items/p3"))
        .respond_with(server_cart(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sales/cart/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orderId": "ord-77"})))
        .expect(1)
        .mount(&server)
        .await;

    let cart = local_cart();
    let payload = CheckoutPayload::from_cart(
        &cart,
        12,
        Decimal::ZERO,
        json!({"name": "Ana"}),
        json!({"address": "Calle 1"}),
        json!({"method": "cash"}),
    );

    let client = SalesClient::with_base_url(&server.uri(), 5).expect("client should build");
    let reconciler = Reconciler::new(client);
    let receipt = reconciler
        .place_order(&payload)
        .await
        .expect("checkout should succeed");
    assert_eq!(receipt, json!({"orderId": "ord-77"}));

    let requests = server.received_requests().await.expect("recording is on");
    let checkout = requests
        .iter()
        .find(|r| r.url.path() == "/sales/cart/checkout")
        .expect("checkout request was sent");
    let body: serde_json::Value = serde_json::from_slice(&checkout.body).expect("json body");
    assert!(body["summary"].get("total").is_none(), "total leaked: {body}");
    assert_eq!(body["summary"]["subtotal"], json!(25.0));
}

#[tokio::test]
async fn bare_mutation_acknowledgements_do_not_abort_checkout() {
    let server = MockServer::start().await;
    let stale = json!([
        {"productId": "p1", "quantity": 2},
        {"productId": "p2", "quantity": 4},
        {"productId": "p3", "quantity": 1}
    ]);

    Mock::given(method("POST"))
        .and(path("/sales/cart"))
        .respond_with(server_cart(stale.clone()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sales/cart"))
        .respond_with(server_cart(stale))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/sales/cart/items"))
        .and(body_json(json!({"productId": "p2", "qty": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updated": true})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/sales/cart/items/p3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sales/cart/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orderId": "ord-78"})))
        .expect(1)
        .mount(&server)
        .await;

    let payload = CheckoutPayload::from_cart(
        &local_cart(),
        12,
        Decimal::ZERO,
        json!({}),
        json!({}),
        json!({}),
    );

    let client = SalesClient::with_base_url(&server.uri(), 5).expect("client should build");
    let receipt = Reconciler::new(client)
        .place_order(&payload)
        .await
        .expect("acknowledged mutations should not abort checkout");
    assert_eq!(receipt, json!({"orderId": "ord-78"}));
}

#[tokio::test]
async fn converged_cart_issues_no_line_calls() {
    let server = MockServer::start().await;
    let converged = json!([
        {"productId": "p1", "quantity": 2},
        {"productId": "p2", "quantity": 1}
    ]);

    Mock::given(method("POST"))
        .and(path("/sales/cart"))
        .respond_with(server_cart(converged.clone()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sales/cart"))
        .respond_with(server_cart(converged))
        .mount(&server)
        .await;

    Mock::given(path("/sales/cart/items"))
        .respond_with(server_cart(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let cart = local_cart();
    let client = SalesClient::with_base_url(&server.uri(), 5).expect("client should build");
    let reconciler = Reconciler::new(client);
    let report = reconciler
        .sync_cart(&cart.to_checkout_items(), 12)
        .await
        .expect("sync should succeed");

    assert_eq!(report.calls(), 0);
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.cart_id, "c-1");
}

#[tokio::test]
async fn network_failure_aborts_before_checkout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sales/cart"))
        .respond_with(server_cart(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sales/cart"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(path("/sales/cart/checkout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cart = local_cart();
    let payload = CheckoutPayload::from_cart(
        &cart,
        12,
        Decimal::ZERO,
        json!({}),
        json!({}),
        json!({}),
    );
    let client = SalesClient::with_base_url(&server.uri(), 5).expect("client should build");
    let err = Reconciler::new(client)
        .place_order(&payload)
        .await
        .expect_err("a failed fetch must abort the checkout");
    assert!(matches!(err, SalesError::UnexpectedStatus { status: 500, .. }));
}
