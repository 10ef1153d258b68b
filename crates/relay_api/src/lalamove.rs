//! Lalamove REST client: signed order-detail fetch and webhook activation.

use std::time::Duration;

use domain::{OrderDetails, OrderDetailsResponse};
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::signature;

pub const PRODUCTION_URL: &str = "https://rest.lalamove.com";
pub const SANDBOX_URL: &str = "https://rest.sandbox.lalamove.com";

pub const ORDER_DETAILS_PATH: &str = "/v3/orders/:orderId";
pub const WEBHOOK_PATH: &str = "/v3/webhook";

/// Provider calls are bounded; a hung upstream surfaces as `TimedOut`.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of an order-detail fetch. Callers map these to different
/// responses, so the cases stay distinct instead of collapsing to an option.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Box<OrderDetails>),
    /// Non-2xx response; the body is not trusted or read.
    Failed {
        status: u16,
    },
    TimedOut,
    NetworkError(String),
}

pub struct LalamoveClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
    api_key: String,
    market: String,
}

impl LalamoveClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.provider_base_url.clone(),
            secret: config.secret.clone(),
            api_key: config.api_key.clone(),
            market: config.market.clone(),
        })
    }

    /// Signed GET of full order details.
    pub async fn fetch_order_details(&self, order_id: &str) -> Result<FetchOutcome, AppError> {
        let path = ORDER_DETAILS_PATH.replace(":orderId", order_id);
        let headers =
            signature::sign_headers(&self.secret, &self.api_key, "GET", &path, "", &self.market)?;

        let response = match self
            .http
            .get(format!("{}{}", self.base_url, path))
            .headers(headers)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Ok(FetchOutcome::TimedOut),
            Err(err) => return Ok(FetchOutcome::NetworkError(err.to_string())),
        };

        if !response.status().is_success() {
            return Ok(FetchOutcome::Failed {
                status: response.status().as_u16(),
            });
        }

        match response.json::<OrderDetailsResponse>().await {
            Ok(body) => Ok(FetchOutcome::Fetched(Box::new(body.data))),
            Err(err) if err.is_timeout() => Ok(FetchOutcome::TimedOut),
            Err(err) => Ok(FetchOutcome::NetworkError(err.to_string())),
        }
    }

    /// Signed PATCH registering `callback_url` as the provider's webhook
    /// target. Returns the provider's response body.
    pub async fn activate_webhook(&self, callback_url: &str) -> Result<Value, AppError> {
        let body = serde_json::json!({ "data": { "url": callback_url } }).to_string();
        let headers = signature::sign_headers(
            &self.secret,
            &self.api_key,
            "PATCH",
            WEBHOOK_PATH,
            &body,
            &self.market,
        )?;

        let response = self
            .http
            .patch(format!("{}{}", self.base_url, WEBHOOK_PATH))
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::UpstreamTimeout
                } else {
                    AppError::Upstream(err.to_string())
                }
            })?;

        let status = response.status();
        let value: Value = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(err.to_string()))?;

        if let Some(errors) = value.get("errors") {
            tracing::error!(%errors, "webhook activation rejected by provider");
        }
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "webhook activation failed with HTTP {status}"
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_details_path_substitutes_order_id() {
        assert_eq!(
            ORDER_DETAILS_PATH.replace(":orderId", "186102479770"),
            "/v3/orders/186102479770"
        );
    }
}
