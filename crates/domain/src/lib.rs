//! Wire types shared between the webhook receiver, the processing queue, and
//! the Lalamove client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only webhook event kind this service acts on.
pub const ORDER_STATUS_CHANGED: &str = "ORDER_STATUS_CHANGED";

/// Order statuses after which no further transitions are expected.
pub mod status {
    pub const COMPLETED: &str = "COMPLETED";
    pub const CANCELLED: &str = "CANCELLED";
}

/// Inbound webhook payload: authentication fields plus the event body.
///
/// `data` stays a raw `serde_json::Value` so signature validation can
/// re-serialize it exactly as the sender did (key order is preserved through
/// the `preserve_order` feature of `serde_json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    pub api_key: String,
    /// Unix seconds. The outbound signing timestamp is milliseconds; the
    /// asymmetry is part of the provider's wire contract.
    pub timestamp: i64,
    /// Hex-encoded HMAC-SHA256 over the canonical signing string.
    pub signature: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_version: Option<String>,
    pub data: Value,
}

impl WebhookEnvelope {
    /// Typed view of `data` for ORDER_STATUS_CHANGED events. `None` when the
    /// payload does not carry the expected shape.
    pub fn status_change(&self) -> Option<StatusChangeData> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeData {
    #[serde(default)]
    pub updated_at: Option<String>,
    pub order: OrderEvent,
}

/// The order summary carried inside a status-change event. `status` is kept
/// as the provider's string so unrecognized transitions pass through intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub previous_status: Option<String>,
    #[serde(default)]
    pub share_link: Option<String>,
    #[serde(default)]
    pub schedule_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl OrderEvent {
    pub fn is_completed(&self) -> bool {
        self.status == status::COMPLETED
    }

    pub fn is_terminal(&self) -> bool {
        self.is_completed() || self.status == status::CANCELLED
    }
}

/// Response envelope of `GET /v3/orders/{orderId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDetailsResponse {
    pub data: OrderDetails,
}

/// Read-only snapshot of a fetched order.
///
/// The `stops` sequence is positionally significant: the zero-based index is
/// the persistence key (`stop_sequence`), so stops must never be reordered,
/// deduplicated, or filtered between fetch and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub order_id: String,
    #[serde(default)]
    pub quotation_id: Option<String>,
    pub price_breakdown: PriceBreakdown,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub share_link: Option<String>,
    pub status: String,
    pub distance: Measure,
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub metadata: Value,
}

/// Price components as decimal strings, per the provider API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub priority_fee: Option<String>,
    #[serde(default)]
    pub multi_stop_surcharge: Option<String>,
    #[serde(default)]
    pub total_exclude_priority_fee: Option<String>,
    pub total: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measure {
    pub value: String,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: String,
    pub lng: String,
}

/// One delivery waypoint within a multi-stop order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub coordinates: Coordinates,
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "POD", default)]
    pub pod: Option<ProofOfDelivery>,
    #[serde(rename = "delivery_code", default)]
    pub delivery_code: Option<DeliveryCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOfDelivery {
    pub status: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub delivered_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCode {
    #[serde(default)]
    pub value: Option<String>,
    pub status: String,
}

/// Queue message wrapping a validated envelope. `order_id`, `status` and
/// `event_type` are echoed into dedicated queue columns for filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedProcessingMessage {
    pub order_id: String,
    pub status: String,
    pub event_type: String,
    /// Enqueue wall-clock time in milliseconds.
    pub timestamp: i64,
    pub webhook_data: WebhookEnvelope,
}
