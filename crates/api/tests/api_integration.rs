//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::config::Config;
use api::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use common::{CustomerId, Money};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, Product, ProductDraft};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "kitchen-secret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_state() -> (Router, Arc<AppState<InMemoryStore>>) {
    let config = Config {
        admin_token: Some(ADMIN_TOKEN.to_string()),
        ..Config::default()
    };
    let state = api::create_default_state(InMemoryStore::new(), &config);
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn setup() -> Router {
    setup_with_state().0
}

async fn seed_product(state: &AppState<InMemoryStore>, name: &str, cents: i64, stock: u32) -> Product {
    state
        .catalog
        .create_product(ProductDraft {
            name: name.to_string(),
            category_id: None,
            price: Money::from_cents(cents),
            description: String::new(),
            active: true,
            stock,
        })
        .await
        .unwrap()
}

fn get(uri: &str, customer: CustomerId) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-customer-id", customer.to_string())
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, customer: CustomerId, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-customer-id", customer.to_string())
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

/// Adds `quantity` of the product and finalizes, returning the new order id.
async fn place_order(app: &Router, customer: CustomerId, product: &Product, quantity: u32) -> i64 {
    let response = send(
        app,
        post_form(
            "/order/new",
            customer,
            &format!("action=add&product_id={}&quantity={quantity}", product.id),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = send(app, post_form("/order/new", customer, "action=finalize")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = location(&response);
    let id = location
        .strip_prefix("/order/")
        .and_then(|rest| rest.strip_suffix("/method"))
        .unwrap_or_else(|| panic!("unexpected redirect {location}"));
    id.parse().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_root_redirects_to_menu() {
    let app = setup();

    let response = send(&app, get("/", CustomerId::new())).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/menu");
}

#[tokio::test]
async fn test_anonymous_customer_is_sent_to_login() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/order/new")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/accounts/login/?next=/order/new");
}

#[tokio::test]
async fn test_menu_hides_sold_out_products() {
    let (app, state) = setup_with_state();
    seed_product(&state, "Empanada", 1500, 10).await;
    seed_product(&state, "Brownie", 1200, 0).await;

    let response = send(&app, get("/menu", CustomerId::new())).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let products = json["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Empanada");
}

#[tokio::test]
async fn test_cart_add_is_clamped_to_stock() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Coffee", 800, 5).await;
    let customer = CustomerId::new();

    for quantity in [3, 4] {
        let response = send(
            &app,
            post_form(
                "/order/new",
                customer,
                &format!("action=add&product_id={}&quantity={quantity}", product.id),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/order/new");
    }

    let json = body_json(send(&app, get("/order/new", customer)).await).await;
    assert_eq!(json["cart"]["lines"][0]["quantity"], 5);
    assert_eq!(json["cart"]["total"], 4000);
    assert_eq!(json["messages"][0]["level"], "success");
}

#[tokio::test]
async fn test_cart_rejects_malformed_quantity() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Coffee", 800, 5).await;

    let response = send(
        &app,
        post_form(
            "/order/new",
            CustomerId::new(),
            &format!("action=add&product_id={}&quantity=lots", product.id),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["quantity"].as_array().is_some());
}

#[tokio::test]
async fn test_cart_update_with_negative_quantity_keeps_one() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Coffee", 800, 5).await;
    let customer = CustomerId::new();

    send(
        &app,
        post_form(
            "/order/new",
            customer,
            &format!("action=add&product_id={}&quantity=3", product.id),
        ),
    )
    .await;
    let response = send(
        &app,
        post_form(
            "/order/new",
            customer,
            &format!("action=update&product_id={}&quantity=-2", product.id),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/order/new");

    let json = body_json(send(&app, get("/order/new", customer)).await).await;
    assert_eq!(json["cart"]["lines"][0]["quantity"], 1);
    assert_eq!(json["cart"]["total"], 800);
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.last().unwrap()["text"], "Quantity updated to 1.");
}

#[tokio::test]
async fn test_cart_rejects_unknown_action() {
    let app = setup();

    let response = send(&app, post_form("/order/new", CustomerId::new(), "action=explode")).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["action"].as_array().is_some());
}

#[tokio::test]
async fn test_finalize_empty_cart_warns() {
    let app = setup();
    let customer = CustomerId::new();

    let response = send(&app, post_form("/order/new", customer, "action=finalize")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/order/new");
    let json = body_json(send(&app, get("/order/new", customer)).await).await;
    assert_eq!(json["messages"][0]["level"], "warning");
}

#[tokio::test]
async fn test_finalize_places_order_and_empties_cart() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Sandwich", 3500, 4).await;
    let customer = CustomerId::new();

    let order_id = place_order(&app, customer, &product, 2).await;

    let json = body_json(send(&app, get("/order/new", customer)).await).await;
    assert!(json["cart"]["lines"].as_array().unwrap().is_empty());

    let json = body_json(
        send(&app, get(&format!("/order/{order_id}/method"), customer)).await,
    )
    .await;
    assert_eq!(json["order"]["status"], "pending");
    assert_eq!(json["order"]["pricing"]["total"], 7000);
    assert!(json["selected"].is_null());

    let remaining = state.catalog.list_products().await.unwrap();
    assert_eq!(remaining[0].stock, 2);
}

#[tokio::test]
async fn test_payment_flow() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Tea", 600, 3).await;
    let customer = CustomerId::new();
    let order_id = place_order(&app, customer, &product, 1).await;

    // Paying before choosing a method goes back to the method step
    let response = send(&app, get(&format!("/order/{order_id}/pay"), customer)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/order/{order_id}/method"));

    let response = send(
        &app,
        post_form(&format!("/order/{order_id}/method"), customer, "method=transfer"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/order/{order_id}/pay"));

    let json = body_json(send(&app, get(&format!("/order/{order_id}/pay"), customer)).await).await;
    assert_eq!(json["payment"]["method"], "transfer");
    assert_eq!(json["payment"]["paid"], false);

    let response = send(
        &app,
        post_form(&format!("/order/{order_id}/pay"), customer, "reference=TRX-42"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/order/{order_id}/confirmation"));

    let json = body_json(
        send(&app, get(&format!("/order/{order_id}/confirmation"), customer)).await,
    )
    .await;
    assert_eq!(json["paid"], true);
    assert_eq!(json["payment"]["reference"], "TRX-42");
    assert_eq!(json["messages"][0]["level"], "success");

    // Switching method after paying resets the payment
    let response = send(
        &app,
        post_form(&format!("/order/{order_id}/method"), customer, "method=qr"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/order/{order_id}/pay"));

    let json = body_json(
        send(&app, get(&format!("/order/{order_id}/confirmation"), customer)).await,
    )
    .await;
    assert_eq!(json["paid"], false);
    assert_eq!(json["payment"]["method"], "qr");
    assert!(json["payment"]["paid_at"].is_null());
}

#[tokio::test]
async fn test_select_method_requires_valid_method() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Tea", 600, 3).await;
    let customer = CustomerId::new();
    let order_id = place_order(&app, customer, &product, 1).await;

    let response = send(
        &app,
        post_form(&format!("/order/{order_id}/method"), customer, "method=barter"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["method"].as_array().is_some());
}

#[tokio::test]
async fn test_cancel_pending_order() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Muffin", 900, 2).await;
    let customer = CustomerId::new();
    let order_id = place_order(&app, customer, &product, 1).await;

    let response = send(
        &app,
        post_form(&format!("/order/{order_id}/cancel"), customer, ""),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/orders/mine");

    let json = body_json(send(&app, get("/orders/mine", customer)).await).await;
    assert!(json["orders"].as_array().unwrap().is_empty());
    assert_eq!(json["messages"][0]["level"], "success");
}

#[tokio::test]
async fn test_cancel_is_refused_once_preparing() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Muffin", 900, 2).await;
    let customer = CustomerId::new();
    let order_id = place_order(&app, customer, &product, 1).await;

    let response = send(
        &app,
        admin_request(
            "POST",
            &format!("/admin/orders/{order_id}/status"),
            Some(ADMIN_TOKEN),
            Some(serde_json::json!({ "status": "preparing" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        post_form(&format!("/order/{order_id}/cancel"), customer, ""),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let json = body_json(send(&app, get("/orders/mine", customer)).await).await;
    assert_eq!(json["orders"][0]["status"], "preparing");
    let levels: Vec<&str> = json["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["level"].as_str().unwrap())
        .collect();
    assert_eq!(levels.last(), Some(&"warning"));
}

#[tokio::test]
async fn test_other_customers_order_is_not_found() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Muffin", 900, 2).await;
    let owner = CustomerId::new();
    let order_id = place_order(&app, owner, &product, 1).await;

    let response = send(
        &app,
        get(&format!("/order/{order_id}/confirmation"), CustomerId::new()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get("/order/not-a-number/confirmation", owner)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_requires_token() {
    let app = setup();

    let response = send(&app, admin_request("GET", "/admin/products", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        admin_request("GET", "/admin/products", Some("wrong"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_catalog_and_promotion_pricing() {
    let app = setup();

    let response = send(
        &app,
        admin_request(
            "POST",
            "/admin/categories",
            Some(ADMIN_TOKEN),
            Some(serde_json::json!({ "name": "Lunch" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let category = body_json(response).await;

    let response = send(
        &app,
        admin_request(
            "POST",
            "/admin/products",
            Some(ADMIN_TOKEN),
            Some(serde_json::json!({
                "name": "Menu of the day",
                "category_id": category["id"],
                "price": 10000,
                "stock": 3
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product: Product = serde_json::from_value(body_json(response).await).unwrap();

    let response = send(
        &app,
        admin_request(
            "POST",
            "/admin/promotions",
            Some(ADMIN_TOKEN),
            Some(serde_json::json!({
                "name": "Big lunch",
                "discount_percent": "10",
                "minimum_amount": 5000
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let customer = CustomerId::new();
    let order_id = place_order(&app, customer, &product, 1).await;

    let json = body_json(
        send(&app, get(&format!("/order/{order_id}/confirmation"), customer)).await,
    )
    .await;
    assert_eq!(json["order"]["pricing"]["subtotal"], 10000);
    assert_eq!(json["order"]["pricing"]["discount"], 1000);
    assert_eq!(json["order"]["pricing"]["total"], 9000);
    assert_eq!(json["paid"], false);
}

#[tokio::test]
async fn test_admin_rejects_invalid_promotion() {
    let app = setup();

    let response = send(
        &app,
        admin_request(
            "POST",
            "/admin/promotions",
            Some(ADMIN_TOKEN),
            Some(serde_json::json!({
                "name": "Too generous",
                "discount_percent": "150"
            })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_admin_status_changes_are_recorded() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Soup", 2500, 5).await;
    let order_id = place_order(&app, CustomerId::new(), &product, 1).await;

    for status in ["preparing", "ready", "delivered"] {
        let response = send(
            &app,
            admin_request(
                "POST",
                &format!("/admin/orders/{order_id}/status"),
                Some(ADMIN_TOKEN),
                Some(serde_json::json!({ "status": status })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Delivered is terminal
    let response = send(
        &app,
        admin_request(
            "POST",
            &format!("/admin/orders/{order_id}/status"),
            Some(ADMIN_TOKEN),
            Some(serde_json::json!({ "status": "cancelled" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        admin_request(
            "GET",
            &format!("/admin/orders/{order_id}/history"),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["pending", "preparing", "ready", "delivered"]);
}

#[tokio::test]
async fn test_admin_deletes_product() {
    let (app, state) = setup_with_state();
    let product = seed_product(&state, "Soup", 2500, 5).await;

    let response = send(
        &app,
        admin_request(
            "DELETE",
            &format!("/admin/products/{}", product.id),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = body_json(send(&app, get("/menu", CustomerId::new())).await).await;
    assert!(json["products"].as_array().unwrap().is_empty());
}
