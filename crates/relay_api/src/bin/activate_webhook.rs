//! One-shot tool: register (or re-register) this service's callback URL with
//! the provider via the signed webhook-activation call.

use relay_api::config::Config;
use relay_api::lalamove::LalamoveClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            std::process::exit(1);
        }
    };

    let Some(callback_url) = config.callback_url.clone() else {
        tracing::error!("CALLBACK_URL must be set for webhook activation");
        std::process::exit(1);
    };

    let client = match LalamoveClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("{err}");
            std::process::exit(1);
        }
    };

    tracing::info!(url = %callback_url, "webhook activation");
    match client.activate_webhook(&callback_url).await {
        Ok(response) => {
            tracing::info!(response = %response, "webhook activation response");
        }
        Err(err) => {
            tracing::error!("webhook activation failed: {err}");
            std::process::exit(1);
        }
    }
}
