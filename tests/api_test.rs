mod support;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use checkout_core::domain::TransactionStatus;
use support::{notification, token_for, TestContext};

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn event_body(ctx: &TestContext, quantity: i32) -> Value {
    json!({
        "eventPriceId": ctx.event_price_id,
        "quantity": quantity,
        "identityNumber": "3174012345678901",
        "fullName": "Sari Wulandari",
        "email": "sari@example.com",
        "phone": "081234567890"
    })
}

#[tokio::test]
async fn test_create_requires_bearer_token() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        post_json("/event-transactions", None, &event_body(&ctx, 1)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
    assert_eq!(ctx.gateway.calls(), 0);
}

#[tokio::test]
async fn test_create_rejects_invalid_token() {
    let ctx = TestContext::new();

    let (status, _) = send(
        ctx.app(),
        post_json("/event-transactions", Some("not-a-jwt"), &event_body(&ctx, 1)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_event_transaction() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 2)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["quantity"], 2);
    assert_eq!(body["userId"], ctx.user_id.to_string());
    assert_eq!(body["eventPriceId"], ctx.event_price_id.to_string());
    assert_eq!(body["transactionStatus"], "pending");
    assert_eq!(body["paymentMethod"], Value::Null);
    assert_eq!(body["buyerInformation"]["fullName"], "Sari Wulandari");
    assert!(body["snapURL"].as_str().unwrap().starts_with("https://"));

    let total: bigdecimal::BigDecimal = body["totalAmount"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, support::amount("100000"));
}

#[tokio::test]
async fn test_create_product_transaction() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        post_json(
            "/product-transactions",
            Some(&ctx.token()),
            &json!({ "cartId": ctx.cart_id }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["cartId"], ctx.cart_id.to_string());
    assert_eq!(body["transactionStatus"], "pending");
}

#[tokio::test]
async fn test_invalid_quantity_is_bad_request() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 0)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("quantity"));
    assert_eq!(ctx.gateway.calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &json!({ "quantity": "two" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_gateway_failure_is_internal_error() {
    let ctx = TestContext::new();
    ctx.gateway.set_mode(support::GatewayMode::Fail);

    let (status, _) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 1)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ctx.repository.len().await, 0);
}

#[tokio::test]
async fn test_poll_until_paid() {
    let ctx = TestContext::new();
    let token = ctx.token();

    let (_, created) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&token), &event_body(&ctx, 2)),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/event-transactions/{}", id);

    let (status, body) = send(ctx.app(), get(&uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactionStatus"], "pending");

    let paid = notification(&id, "settlement", None, Some("qris"), "100000.00");
    let (status, ack) = send(
        ctx.app(),
        post_json("/midtrans-notification", None, &serde_json::to_value(&paid).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "ok");
    assert_eq!(ack["outcome"], "applied");
    assert_eq!(ack["orderId"], id);
    assert_eq!(ack["transactionStatus"], "paid");

    let (_, body) = send(ctx.app(), get(&uri, &token)).await;
    assert_eq!(body["transactionStatus"], "paid");
    assert_eq!(body["paymentMethod"], "qris");
}

#[tokio::test]
async fn test_other_users_transaction_is_not_found() {
    let ctx = TestContext::new();

    let (_, created) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 1)),
    )
    .await;
    let uri = format!("/event-transactions/{}", created["id"].as_str().unwrap());

    let (status, _) = send(ctx.app(), get(&uri, &token_for(Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_kind_mismatch_is_not_found() {
    let ctx = TestContext::new();

    let (_, created) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 1)),
    )
    .await;
    let uri = format!("/product-transactions/{}", created["id"].as_str().unwrap());

    let (status, _) = send(ctx.app(), get(&uri, &ctx.token())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unroutable_notification_is_not_found() {
    let ctx = TestContext::new();
    let paid = notification(&Uuid::new_v4().to_string(), "settlement", None, None, "100000.00");

    let (status, _) = send(
        ctx.app(),
        post_json("/midtrans-notification", None, &serde_json::to_value(&paid).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(ctx.dlq.entries().await.len(), 1);
}

#[tokio::test]
async fn test_forged_notification_is_unauthorized() {
    let ctx = TestContext::new();
    let (_, created) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 1)),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let mut forged = notification(id, "settlement", None, None, "50000.00");
    forged.signature_key = Some("00".repeat(64));

    let (status, _) = send(
        ctx.app(),
        post_json("/midtrans-notification", None, &serde_json::to_value(&forged).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let stored = ctx.repository.get(id.parse().unwrap()).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_stale_notification_is_acknowledged() {
    let ctx = TestContext::new();
    let (_, created) = send(
        ctx.app(),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 1)),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    for status in ["settlement", "pending"] {
        let n = notification(id, status, None, None, "50000.00");
        let (code, _) = send(
            ctx.app(),
            post_json("/midtrans-notification", None, &serde_json::to_value(&n).unwrap()),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
    }

    let (_, body) = send(ctx.app(), get(&format!("/event-transactions/{}", id), &ctx.token())).await;
    assert_eq!(body["transactionStatus"], "paid");
}

#[tokio::test]
async fn test_malformed_notification_is_bad_request() {
    let ctx = TestContext::new();

    let (status, _) = send(
        ctx.app(),
        post_json("/midtrans-notification", None, &json!({ "order_id": "x" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_without_dependencies_is_healthy() {
    let ctx = TestContext::new();

    let response = ctx
        .app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_fractional_cart_total_is_bad_request() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        post_json(
            "/product-transactions",
            Some(&ctx.token()),
            &json!({ "cartId": ctx.fractional_cart_id }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("totalAmount"));
    assert_eq!(ctx.gateway.calls(), 0);
}

#[tokio::test]
async fn test_malformed_transaction_id_is_json_bad_request() {
    let ctx = TestContext::new();

    for uri in ["/event-transactions/not-a-uuid", "/product-transactions/42"] {
        let (status, body) = send(ctx.app(), get(uri, &ctx.token())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_request_timeout_after_gateway_keeps_transaction() {
    let ctx = TestContext::new();
    ctx.repository.delay_inserts(Duration::from_millis(200));

    let (status, _) = send(
        ctx.app_with_timeout(Duration::from_millis(20)),
        post_json("/event-transactions", Some(&ctx.token()), &event_body(&ctx, 1)),
    )
    .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let order_id = ctx.gateway.last_request().await.unwrap().order_id;
    assert!(ctx.repository.get(order_id).await.is_some());
    assert!(ctx.cache.marker(order_id).await.is_some());
}
