use std::env;

use crate::error::AppError;
use crate::lalamove;

/// How validated completed-order events are processed: inline in the HTTP
/// handler, or through the database-backed queue drained by the worker.
/// Fixed per deployment; one entry point never serves both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Inline,
    Queue,
}

/// Process-wide configuration, loaded once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub database_url: Option<String>,
    /// Shared HMAC secret for both inbound validation and outbound signing.
    pub secret: String,
    pub api_key: String,
    pub market: String,
    pub provider_base_url: String,
    /// Inbound route, also the `path` component of the inbound canonical
    /// signing string.
    pub webhook_path: String,
    pub dispatch_mode: DispatchMode,
    pub gchat_webhook_url: Option<String>,
    /// Public callback URL sent to the provider on webhook activation.
    pub callback_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let secret = require("SECRET")?;
        let api_key = require("API_KEY")?;

        let provider_base_url = match env::var("PROVIDER_BASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => match env::var("APP_ENV").as_deref() {
                Ok("production") => lalamove::PRODUCTION_URL.to_string(),
                _ => lalamove::SANDBOX_URL.to_string(),
            },
        };

        let webhook_path =
            env::var("WEBHOOK_PATH").unwrap_or_else(|_| "/webhooks/lalamove".to_string());
        if !webhook_path.starts_with('/') {
            return Err(AppError::Config(format!(
                "WEBHOOK_PATH must start with '/': {webhook_path}"
            )));
        }

        let dispatch_mode = match env::var("DISPATCH_MODE").as_deref() {
            Ok("queue") => DispatchMode::Queue,
            Ok("inline") | Err(_) => DispatchMode::Inline,
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "DISPATCH_MODE must be 'inline' or 'queue': {other}"
                )))
            }
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8080)?,
            database_url: optional("DATABASE_URL"),
            secret,
            api_key,
            market: env::var("MARKET").unwrap_or_else(|_| "MY".to_string()),
            provider_base_url,
            webhook_path,
            dispatch_mode,
            gchat_webhook_url: optional("GCHAT_WEBHOOK_URL"),
            callback_url: optional("CALLBACK_URL"),
        })
    }
}

fn require(key: &str) -> Result<String, AppError> {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Config(format!("missing required environment variable {key}"))
        })
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
