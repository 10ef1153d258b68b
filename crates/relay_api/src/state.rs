use std::sync::Arc;

use db::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::lalamove::LalamoveClient;
use crate::notify::GChatNotifier;

/// Shared app state for Axum handlers. DB is optional so the receiver can run
/// without Postgres; persistence is simply skipped in that case.
#[derive(Clone)]
pub struct AppState {
    pub db: Option<PgPool>,
    pub config: Arc<Config>,
    pub lalamove: Arc<LalamoveClient>,
    pub notifier: Arc<GChatNotifier>,
}

impl AppState {
    pub fn new(config: Config, db: Option<PgPool>) -> Result<Self, AppError> {
        let lalamove = Arc::new(LalamoveClient::new(&config)?);
        let notifier = Arc::new(GChatNotifier::new(config.gchat_webhook_url.clone()));
        Ok(Self {
            db,
            config: Arc::new(config),
            lalamove,
            notifier,
        })
    }
}
