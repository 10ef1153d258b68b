//! Queue processor: drains the processing queue one message at a time.
//!
//! No in-process retry: a failed message is returned to the queue (bounded
//! attempts, then dead-lettered) and the redelivery cadence is the queue's.
//! Processing is idempotent, so a redelivered message converges to the same
//! persisted state.

use std::time::Duration;

use db::{JobRow, PgPool};
use domain::QueuedProcessingMessage;

use crate::error::AppError;
use crate::lalamove::FetchOutcome;
use crate::state::AppState;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Claims older than this with no ack are assumed orphaned and requeued.
const STALE_CLAIM_SECS: i64 = 300;
const MAX_ATTEMPTS: i32 = 5;

pub async fn run_queue_processor(state: AppState) {
    let Some(db) = state.db.clone() else {
        tracing::error!("queue processor requires a database; not starting");
        return;
    };
    tracing::info!("queue processor started");

    loop {
        if let Err(err) = db::requeue_stale_jobs(&db, STALE_CLAIM_SECS).await {
            tracing::error!(error = %err, "failed to requeue stale jobs");
        }

        let job = match db::claim_next_job(&db).await {
            Ok(job) => job,
            Err(err) => {
                tracing::error!(error = %err, "failed to claim job");
                None
            }
        };
        let Some(job) = job else {
            tokio::time::sleep(POLL_INTERVAL).await;
            continue;
        };

        match process_job(&state, &db, &job).await {
            Ok(()) => {
                if let Err(err) = db::mark_job_done(&db, job.id).await {
                    tracing::error!(error = %err, job_id = %job.id, "failed to ack job");
                }
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    order_id = %job.order_id,
                    attempts = job.attempts,
                    "job failed, returning for redelivery"
                );
                if let Err(mark_err) =
                    db::mark_job_failed(&db, job.id, MAX_ATTEMPTS, &err.to_string()).await
                {
                    tracing::error!(error = %mark_err, job_id = %job.id, "failed to nack job");
                }
            }
        }
    }
}

async fn process_job(state: &AppState, db: &PgPool, job: &JobRow) -> Result<(), AppError> {
    let message: QueuedProcessingMessage = serde_json::from_value(job.body.clone())
        .map_err(|err| AppError::Queue(format!("unreadable message body: {err}")))?;

    if message.status != domain::status::COMPLETED {
        tracing::debug!(order_id = %message.order_id, status = %message.status, "ignoring non-completed order");
        return Ok(());
    }

    match state.lalamove.fetch_order_details(&message.order_id).await? {
        FetchOutcome::Fetched(details) => {
            db::update_order_from_details(db, &details).await?;
            state
                .notifier
                .send(&format!(
                    "Order {} status changed to: {}",
                    message.order_id, message.status
                ))
                .await;
            tracing::info!(order_id = %message.order_id, "completed order processed");
            Ok(())
        }
        FetchOutcome::Failed { status } => {
            state
                .notifier
                .send(&format!(
                    "Failed to fetch order details for {}",
                    message.order_id
                ))
                .await;
            Err(AppError::Upstream(format!(
                "order detail fetch returned HTTP {status}"
            )))
        }
        FetchOutcome::TimedOut => {
            state
                .notifier
                .send(&format!(
                    "Timeout fetching order details for {}",
                    message.order_id
                ))
                .await;
            Err(AppError::UpstreamTimeout)
        }
        FetchOutcome::NetworkError(err) => {
            state
                .notifier
                .send(&format!(
                    "Failed to fetch order details for {}",
                    message.order_id
                ))
                .await;
            Err(AppError::Upstream(err))
        }
    }
}
