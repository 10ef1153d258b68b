use relay_api::config::{Config, DispatchMode};
use relay_api::routes;
use relay_api::state::AppState;
use relay_api::worker;

#[tokio::main]
async fn main() {
    // Load .env from workspace root (when running from project root)
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

    let db = match &config.database_url {
        Some(url) => match db::connect(url).await {
            Ok(pool) => {
                if let Err(err) = db::run_migrations(&pool).await {
                    tracing::error!("migrations failed: {err}");
                    return;
                }
                tracing::info!("database connected, migrations applied");
                Some(pool)
            }
            Err(err) => {
                tracing::warn!("database not available: {err} (order persistence disabled)");
                None
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set; order persistence disabled");
            None
        }
    };

    if config.dispatch_mode == DispatchMode::Queue && db.is_none() {
        tracing::error!("DISPATCH_MODE=queue requires a reachable database");
        std::process::exit(1);
    }

    let http_port = config.http_port;
    let dispatch_mode = config.dispatch_mode;
    let state = match AppState::new(config, db) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("{err}");
            std::process::exit(1);
        }
    };

    if dispatch_mode == DispatchMode::Queue {
        tokio::spawn(worker::run_queue_processor(state.clone()));
    }

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{http_port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!("listening on http://{addr}");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {err}");
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
