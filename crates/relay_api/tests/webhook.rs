use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Json;
use chrono::Utc;
use hmac::{Hmac, Mac};
use relay_api::config::{Config, DispatchMode};
use relay_api::error::AppError;
use relay_api::routes::router;
use relay_api::routes::webhook::completed_error_response;
use relay_api::state::AppState;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const API_KEY: &str = "test-api-key";
const WEBHOOK_PATH: &str = "/webhooks/lalamove";

fn test_config(base_url: &str) -> Config {
    Config {
        http_port: 0,
        database_url: None,
        secret: SECRET.into(),
        api_key: API_KEY.into(),
        market: "MY".into(),
        provider_base_url: base_url.into(),
        webhook_path: WEBHOOK_PATH.into(),
        dispatch_mode: DispatchMode::Inline,
        gchat_webhook_url: None,
        callback_url: None,
    }
}

fn app_with(config: Config) -> axum::Router {
    router(AppState::new(config, None).unwrap())
}

/// Inline-mode app pointed at a provider base URL. Tests that must not reach
/// the provider use a closed local port so an accidental fetch fails fast.
fn app(base_url: &str) -> axum::Router {
    app_with(test_config(base_url))
}

fn webhook_request(body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Envelope signed exactly the way the provider signs: HMAC-SHA256 over
/// `"{timestamp}\r\nPOST\r\n{path}\r\n\r\n{json(data)}"`.
fn signed_envelope(data: &Value, timestamp: i64) -> Value {
    let payload = serde_json::to_string(data).unwrap();
    let canonical = format!("{timestamp}\r\nPOST\r\n{WEBHOOK_PATH}\r\n\r\n{payload}");
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(canonical.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    json!({
        "apiKey": API_KEY,
        "timestamp": timestamp,
        "signature": signature,
        "eventType": "ORDER_STATUS_CHANGED",
        "data": data,
    })
}

fn order_data(order_id: &str, status: &str) -> Value {
    json!({
        "order": {
            "orderId": order_id,
            "status": status,
            "driverId": "2809512",
            "previousStatus": "PICKED_UP"
        },
        "updatedAt": "2025-08-03T16:43.00Z"
    })
}

fn order_details_body(order_id: &str) -> Value {
    json!({
        "data": {
            "orderId": order_id,
            "priceBreakdown": { "total": "17.50", "currency": "MYR" },
            "driverId": "2809512",
            "shareLink": "https://share.example.com/x",
            "status": "COMPLETED",
            "distance": { "value": "7297", "unit": "m" },
            "stops": [
                {
                    "coordinates": { "lat": "1.482", "lng": "103.742" },
                    "address": "Pickup point"
                },
                {
                    "coordinates": { "lat": "1.493", "lng": "103.761" },
                    "address": "Drop-off point",
                    "POD": {
                        "status": "DELIVERED",
                        "deliveredAt": "2025-08-03T16:43:00.000Z"
                    }
                }
            ],
            "metadata": {}
        }
    })
}

/// Local stand-in for the provider API, answering GET /v3/orders/{id}.
async fn spawn_provider_stub(status: StatusCode, body: Value) -> String {
    let handler = move || {
        let body = body.clone();
        async move { (status, Json(body)) }
    };
    let stub = axum::Router::new().route("/v3/orders/:order_id", axum::routing::get(handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn empty_body_is_acknowledged_as_activation_ping() {
    let app = app("http://127.0.0.1:1");
    let response = app.oneshot(webhook_request(Body::empty())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Post webhook activation data");
}

#[tokio::test]
async fn malformed_body_is_rejected_before_validation() {
    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from("{not json")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid JSON in request body");
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let mut envelope = signed_envelope(
        &order_data("186102479770", "COMPLETED"),
        Utc::now().timestamp(),
    );
    envelope["signature"] = json!("deadbeefdeadbeefdeadbeefdeadbeef");

    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid Webhook");
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let mut envelope = signed_envelope(
        &order_data("186102479770", "COMPLETED"),
        Utc::now().timestamp(),
    );
    envelope["apiKey"] = json!("not-our-key");

    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid Webhook");
}

#[tokio::test]
async fn stale_timestamp_is_rejected_despite_valid_signature() {
    // Signed correctly, but six minutes old.
    let envelope = signed_envelope(
        &order_data("186102479770", "COMPLETED"),
        Utc::now().timestamp() - 360,
    );

    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid Webhook");
}

#[tokio::test]
async fn unrecognized_event_type_is_acknowledged_without_action() {
    let mut envelope = signed_envelope(
        &json!({ "balance": "12.00" }),
        Utc::now().timestamp(),
    );
    envelope["eventType"] = json!("WALLET_BALANCE_CHANGED");

    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Webhook received");
}

#[tokio::test]
async fn non_terminal_status_is_acknowledged_without_fetch() {
    // The provider base URL is a closed port: any fetch attempt would turn
    // this response into a 500.
    let envelope = signed_envelope(
        &order_data("186102479770", "PICKED_UP"),
        Utc::now().timestamp(),
    );

    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Webhook received and status updated");
    assert_eq!(body["orderId"], "186102479770");
    assert_eq!(body["status"], "PICKED_UP");
}

#[tokio::test]
async fn cancelled_is_acknowledged_without_fetch() {
    let envelope = signed_envelope(
        &order_data("186102479770", "CANCELLED"),
        Utc::now().timestamp(),
    );

    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Webhook received and status updated");
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
async fn completed_order_fetches_details_and_acknowledges() {
    let base_url = spawn_provider_stub(
        StatusCode::OK,
        order_details_body("186102479770"),
    )
    .await;
    let envelope = signed_envelope(
        &order_data("186102479770", "COMPLETED"),
        Utc::now().timestamp(),
    );

    let app = app(&base_url);
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "Webhook received, order details fetched and updated"
    );
    assert_eq!(body["orderId"], "186102479770");
    assert_eq!(body["status"], "COMPLETED");
}

#[tokio::test]
async fn completed_order_with_upstream_rejection_still_acknowledges() {
    let base_url = spawn_provider_stub(StatusCode::NOT_FOUND, json!({})).await;
    let envelope = signed_envelope(
        &order_data("186102479770", "COMPLETED"),
        Utc::now().timestamp(),
    );

    let app = app(&base_url);
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "Webhook received but failed to fetch order details"
    );
    assert_eq!(body["orderId"], "186102479770");
}

#[tokio::test]
async fn completed_order_with_unreachable_provider_returns_500() {
    let envelope = signed_envelope(
        &order_data("186102479770", "COMPLETED"),
        Utc::now().timestamp(),
    );

    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Error processing completed order");
    assert_eq!(body["orderId"], "186102479770");
}

#[tokio::test]
async fn timeout_error_is_distinguishable_from_generic_failure() {
    let (status, Json(timeout_body)) =
        completed_error_response(&AppError::UpstreamTimeout, "186102479770");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(timeout_body["error"], "Request timeout while processing order");
    assert_eq!(timeout_body["orderId"], "186102479770");

    let (status, Json(generic_body)) = completed_error_response(
        &AppError::Upstream("connection reset".into()),
        "186102479770",
    );
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(generic_body["error"], "Error processing completed order");
    assert_ne!(timeout_body["error"], generic_body["error"]);
}

#[tokio::test]
async fn queue_mode_without_database_fails_closed() {
    let mut config = test_config("http://127.0.0.1:1");
    config.dispatch_mode = DispatchMode::Queue;
    let envelope = signed_envelope(
        &order_data("186102479770", "COMPLETED"),
        Utc::now().timestamp(),
    );

    let app = app_with(config);
    let response = app
        .oneshot(webhook_request(Body::from(envelope.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("queue"));
}

#[tokio::test]
async fn health_reports_database_state() {
    let app = app("http://127.0.0.1:1");
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["db"], "disconnected");
}
