//! HTTP surface tests
//!
//! Drive the router directly with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use trade_ledger_backend::external::{MemoryHistorySink, MemoryNotifier};
use trade_ledger_backend::store::{MemoryRepository, ShortfallPolicy};
use trade_ledger_backend::{create_app, AppState, Config};
use uuid::Uuid;

async fn app() -> Router {
    app_with(Config::default()).await
}

async fn app_with(config: Config) -> Router {
    let state = AppState::new(
        config,
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryHistorySink::new()),
        Arc::new(MemoryNotifier::new()),
    )
    .await
    .unwrap();
    create_app(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn id(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["shortfall_policy"], "restore_virtual");
}

#[tokio::test]
async fn test_health_reports_configured_policy() {
    let mut config = Config::default();
    config.ledger.shortfall_policy = ShortfallPolicy::DrainOnly;
    let app = app_with(config).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shortfall_policy"], "drain_only");
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = app().await;
    let uri = format!("/api/v1/orders/{}", Uuid::new_v4());
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_order_purchase_flow_over_http() {
    let app = app().await;
    let org = Uuid::new_v4();

    let (status, item) = send(
        &app,
        Method::POST,
        "/api/v1/items",
        Some(json!({ "organization_id": org, "name": "Steel rod", "tax_rate": "12" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, warehouse) = send(
        &app,
        Method::POST,
        "/api/v1/warehouses",
        Some(json!({ "organization_id": org, "name": "Yard" })),
    )
    .await;
    let (_, manufacturer) = send(
        &app,
        Method::POST,
        "/api/v1/manufacturers",
        Some(json!({ "organization_id": org, "name": "Forge Ltd" })),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/prices",
        Some(json!({ "item_id": id(&item), "pickup": null, "rate": "55" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, order) = send(
        &app,
        Method::POST,
        "/api/v1/orders",
        Some(json!({
            "organization_id": org,
            "manufacturer_id": id(&manufacturer),
            "warehouse_id": id(&warehouse),
            "lines": [{ "item_id": id(&item), "ordered_quantity": "50" }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "created");

    let purchase = json!({
        "order_id": id(&order),
        "warehouse_id": id(&warehouse),
        "lines": [{ "item_id": id(&item), "quantity": "50" }],
    });
    let (status, _) = send(&app, Method::POST, "/api/v1/purchases", Some(purchase.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, "/api/v1/purchases", Some(purchase)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "OVER_PURCHASE");
    assert_eq!(body["error"]["details"]["ordered"], "50");

    let uri = format!("/api/v1/warehouses/{}", id(&warehouse));
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Yard");
    assert_eq!(body["billed_inventory"][0]["quantity"], "50");
    assert_eq!(body["virtual_inventory"][0]["quantity"], "0");

    let uri = format!("/api/v1/warehouses/{}/items/{}", id(&warehouse), id(&item));
    let (_, snapshot) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(snapshot["billed_quantity"], "50");

    let uri = format!("/api/v1/item-history?item_id={}", id(&item));
    let (_, history) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_booking_is_bad_request() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/bookings",
        Some(json!({
            "organization_id": Uuid::new_v4(),
            "warehouse_id": Uuid::new_v4(),
            "buyer_id": Uuid::new_v4(),
            "lines": [],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_reminders_endpoint() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/reminders?as_of=2024-06-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
