//! HMAC request signing and webhook validation.
//!
//! Both directions share one canonical string shape:
//! `"{timestamp}\r\n{method}\r\n{path}\r\n\r\n{body}"`, HMAC-SHA256 with the
//! shared secret, hex-encoded. Inbound timestamps are unix seconds; outbound
//! timestamps are milliseconds. That asymmetry is part of the provider's
//! wire contract and must not be normalized away.

use chrono::Utc;
use domain::WebhookEnvelope;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed skew between an inbound timestamp and the local clock.
/// Inclusive: a request exactly this old (or new) still validates.
pub const WEBHOOK_TOLERANCE_MS: i64 = 300_000;

pub fn canonical_string(timestamp: &str, method: &str, path: &str, body: &str) -> String {
    format!("{timestamp}\r\n{method}\r\n{path}\r\n\r\n{body}")
}

fn hmac_hex(secret: &str, canonical: &str) -> Option<String> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return None,
    };
    mac.update(canonical.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Validate an inbound webhook envelope against the expected API key, the
/// replay window, and the HMAC over the re-serialized `data` field.
///
/// `method` and `path` are the constants the provider signs against for this
/// endpoint, not values read from the request line. Pure; rejection reasons
/// are logged by the caller.
pub fn validate_envelope(
    envelope: &WebhookEnvelope,
    secret: &str,
    api_key: &str,
    method: &str,
    path: &str,
) -> bool {
    validate_envelope_at(
        envelope,
        secret,
        api_key,
        method,
        path,
        Utc::now().timestamp_millis(),
    )
}

fn validate_envelope_at(
    envelope: &WebhookEnvelope,
    secret: &str,
    api_key: &str,
    method: &str,
    path: &str,
    now_ms: i64,
) -> bool {
    if envelope.api_key != api_key {
        return false;
    }

    let request_ms = envelope.timestamp.saturating_mul(1000);
    if (now_ms - request_ms).abs() > WEBHOOK_TOLERANCE_MS {
        return false;
    }

    let payload = match serde_json::to_string(&envelope.data) {
        Ok(payload) => payload,
        Err(_) => return false,
    };
    let canonical = canonical_string(&envelope.timestamp.to_string(), method, path, &payload);
    let expected = match hmac_hex(secret, &canonical) {
        Some(expected) => expected,
        None => return false,
    };

    constant_time_eq_hex(&expected, &envelope.signature)
}

/// Headers for an outbound provider request:
/// `Authorization: hmac {apiKey}:{timestampMs}:{hexSignature}` plus the fixed
/// content type and the market tag.
pub fn sign_headers(
    secret: &str,
    api_key: &str,
    method: &str,
    path: &str,
    body: &str,
    market: &str,
) -> Result<HeaderMap, AppError> {
    let time = Utc::now().timestamp_millis().to_string();
    let canonical = canonical_string(&time, method, path, body);
    let signature = hmac_hex(secret, &canonical)
        .ok_or_else(|| AppError::Internal("HMAC rejected signing key".to_string()))?;
    let token = format!("{api_key}:{time}:{signature}");

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("hmac {token}"))
            .map_err(|err| AppError::Internal(format!("invalid Authorization header: {err}")))?,
    );
    headers.insert(
        HeaderName::from_static("market"),
        HeaderValue::from_str(market)
            .map_err(|err| AppError::Internal(format!("invalid Market header: {err}")))?,
    );
    Ok(headers)
}

fn constant_time_eq_hex(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
