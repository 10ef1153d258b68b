use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use domain::{OrderEvent, QueuedProcessingMessage, WebhookEnvelope};

use crate::config::DispatchMode;
use crate::error::AppError;
use crate::lalamove::FetchOutcome;
use crate::signature;
use crate::state::AppState;

/// Entry point for provider status webhooks.
///
/// An empty body is the provider's activation ping and is acknowledged
/// without further checks. Everything else is parsed, validated, and either
/// handled inline or queued, depending on the configured dispatch mode.
pub async fn receive_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if body.is_empty() {
        tracing::debug!("webhook: empty body received");
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "Post webhook activation data" })),
        ));
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body).map_err(|err| {
        tracing::error!(error = %err, "error parsing webhook body");
        AppError::MalformedBody
    })?;

    let valid = signature::validate_envelope(
        &envelope,
        &state.config.secret,
        &state.config.api_key,
        "POST",
        &state.config.webhook_path,
    );
    if !valid {
        tracing::warn!(signature = %envelope.signature, "webhook failed validation");
        state
            .notifier
            .send(&format!("Invalid webhook signature: {}", envelope.signature))
            .await;
        return Err(AppError::InvalidWebhook);
    }

    if envelope.event_type != domain::ORDER_STATUS_CHANGED {
        return Ok((StatusCode::OK, Json(json!({ "message": "Webhook received" }))));
    }
    let Some(change) = envelope.status_change() else {
        tracing::warn!("status-change event without the expected data shape");
        return Ok((StatusCode::OK, Json(json!({ "message": "Webhook received" }))));
    };
    let order = change.order;
    tracing::info!(order_id = %order.order_id, status = %order.status, "order status changed");

    if !order.is_completed() {
        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Webhook received and status updated",
                "orderId": order.order_id,
                "status": order.status,
            })),
        ));
    }

    match state.config.dispatch_mode {
        DispatchMode::Queue => enqueue_completed(&state, &envelope, &order).await,
        DispatchMode::Inline => process_completed_inline(&state, &order).await,
    }
}

/// Queue mode: publish and acknowledge immediately. The worker takes it from
/// there; redelivery is the queue's concern.
async fn enqueue_completed(
    state: &AppState,
    envelope: &WebhookEnvelope,
    order: &OrderEvent,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Some(db) = &state.db else {
        return Err(AppError::Queue(
            "queue dispatch requires a database".to_string(),
        ));
    };

    let message = QueuedProcessingMessage {
        order_id: order.order_id.clone(),
        status: order.status.clone(),
        event_type: envelope.event_type.clone(),
        timestamp: Utc::now().timestamp_millis(),
        webhook_data: envelope.clone(),
    };
    let id = db::enqueue_job(db, &message).await?;
    tracing::info!(order_id = %order.order_id, job_id = %id, "queued order for processing");

    Ok((StatusCode::OK, Json(json!({ "message": "Webhook received" }))))
}

/// Inline mode: fetch, notify, persist, and report the outcome in the
/// response. Fetch failures with a definite upstream answer (non-2xx) are
/// acknowledged with 200; timeouts and transport errors surface as 500 so the
/// provider's own redelivery can kick in.
async fn process_completed_inline(
    state: &AppState,
    order: &OrderEvent,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let outcome = match state.lalamove.fetch_order_details(&order.order_id).await {
        Ok(outcome) => outcome,
        Err(err) => return Ok(completed_error_response(&err, &order.order_id)),
    };

    match outcome {
        FetchOutcome::Fetched(details) => {
            tracing::info!(order_id = %order.order_id, "fetched order details for completed order");
            state
                .notifier
                .send(&format!(
                    "Order {} status changed to: {}",
                    order.order_id, order.status
                ))
                .await;

            if let Some(db) = &state.db {
                if let Err(err) = db::update_order_from_details(db, &details).await {
                    tracing::error!(error = %err, order_id = %order.order_id, "error updating order in database");
                    return Ok(completed_error_response(
                        &AppError::Database(err),
                        &order.order_id,
                    ));
                }
            }

            Ok((
                StatusCode::OK,
                Json(json!({
                    "message": "Webhook received, order details fetched and updated",
                    "orderId": order.order_id,
                    "status": order.status,
                })),
            ))
        }
        FetchOutcome::Failed { status } => {
            tracing::error!(status, order_id = %order.order_id, "failed to fetch order details");
            Ok((
                StatusCode::OK,
                Json(json!({
                    "message": "Webhook received but failed to fetch order details",
                    "orderId": order.order_id,
                    "status": order.status,
                })),
            ))
        }
        FetchOutcome::TimedOut => {
            tracing::error!(order_id = %order.order_id, "order detail fetch timed out");
            Ok(completed_error_response(
                &AppError::UpstreamTimeout,
                &order.order_id,
            ))
        }
        FetchOutcome::NetworkError(err) => {
            tracing::error!(error = %err, order_id = %order.order_id, "order detail fetch failed");
            Ok(completed_error_response(
                &AppError::Upstream(err),
                &order.order_id,
            ))
        }
    }
}

/// 500 body for a completed-order processing failure. Timeouts keep a
/// distinguishable message; everything else collapses to the generic one.
pub fn completed_error_response(err: &AppError, order_id: &str) -> (StatusCode, Json<Value>) {
    let message = match err {
        AppError::UpstreamTimeout => "Request timeout while processing order",
        _ => "Error processing completed order",
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message, "orderId": order_id })),
    )
}
