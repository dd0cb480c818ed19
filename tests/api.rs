//! Router-level tests for paths that are decided before any database access.
//! The pool is lazy and never connects.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use storefront::auth::Role;
use storefront::publisher::EventPublisher;
use storefront::{api, AppState, Config};

fn state() -> AppState {
    let config = Config::for_tests();
    let db = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
    AppState::new(db, config, EventPublisher::disabled())
}

fn app(state: AppState) -> Router {
    api::router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_service() {
    let response = app(state()).oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "healthy", "service": "storefront" }));
}

#[tokio::test]
async fn admin_requires_token() {
    let response = app(state())
        .oneshot(Request::get("/api/v1/admin/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "E1001");
}

#[tokio::test]
async fn admin_rejects_customer_role() {
    let state = state();
    let token = state.jwt.generate_token(Uuid::new_v4(), "mona@example.com", Role::Customer).unwrap();
    let request = Request::get("/api/v1/admin/orders")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "E2001");
}

#[tokio::test]
async fn invalid_bearer_token_is_rejected_on_optional_routes() {
    let request = Request::get("/api/v1/cart")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "E1002");
}

#[tokio::test]
async fn anonymous_cart_without_token_is_empty() {
    let response = app(state()).oneshot(Request::get("/api/v1/cart").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["currency"], "EGP");
    assert_eq!(body["total"], 0);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn register_validates_input() {
    let request = json_request(
        "POST",
        "/api/v1/auth/register",
        json!({ "email": "not-an-email", "password": "short", "name": "Mona" }),
    );
    let response = app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "E0002");
}

#[tokio::test]
async fn guest_checkout_requires_email() {
    let request = json_request(
        "POST",
        "/api/v1/checkout",
        json!({
            "provider": "stripe",
            "shipping_address": {
                "first_name": "Mona", "last_name": "Adel", "phone": "+201001234567",
                "street": "12 Tahrir St", "city": "Cairo", "country": "EG"
            }
        }),
    );
    let response = app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stripe_webhook_with_bad_signature_is_unauthorized() {
    let now = chrono::Utc::now().timestamp();
    let request = Request::post("/api/v1/webhooks/stripe")
        .header("stripe-signature", format!("t={now},v1={}", "ab".repeat(32)))
        .body(Body::from(r#"{"id":"evt_1","type":"checkout.session.completed"}"#))
        .unwrap();
    let response = app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stripe_webhook_without_signature_is_unauthorized() {
    let request = Request::post("/api/v1/webhooks/stripe").body(Body::from("{}")).unwrap();
    let response = app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn paymob_webhook_without_hmac_is_unauthorized() {
    let request = json_request("POST", "/api/v1/webhooks/paymob", json!({ "type": "TRANSACTION", "obj": { "id": 1 } }));
    let response = app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn paymob_return_with_forged_hmac_is_unauthorized() {
    let request = Request::get(format!("/api/v1/payments/paymob/return?id=55&success=true&hmac={}", "00".repeat(64)))
        .body(Body::empty())
        .unwrap();
    let response = app(state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
