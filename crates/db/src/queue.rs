//! Processing queue: one row per completed-order event, claimed with
//! `FOR UPDATE SKIP LOCKED`, bounded attempts, dead-lettering.
//!
//! Delivery is at-least-once: a claim that is never acked is returned to the
//! queue after a visibility timeout, so consumers must tolerate re-runs.

use domain::QueuedProcessingMessage;
use serde_json::Value;
use uuid::Uuid;

use crate::PgPool;

/// A claimed message. `attempts` counts this claim too.
#[derive(Debug, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub order_id: String,
    pub status: String,
    pub event_type: String,
    pub body: Value,
    pub attempts: i32,
}

/// Publish one message. `order_id`/`status`/`event_type` are stored alongside
/// the body so consumers and operators can filter without parsing JSON.
pub async fn enqueue_job(
    pool: &PgPool,
    message: &QueuedProcessingMessage,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO processing_queue (id, order_id, status, event_type, body)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(&message.order_id)
    .bind(&message.status)
    .bind(&message.event_type)
    .bind(sqlx::types::Json(message))
    .execute(pool)
    .await?;
    Ok(id)
}

/// Claim the oldest queued message, if any. The claim bumps `attempts` so a
/// message that keeps failing eventually dead-letters.
pub async fn claim_next_job(pool: &PgPool) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE processing_queue
        SET state = 'processing', attempts = attempts + 1, claimed_at = now()
        WHERE id = (
            SELECT id FROM processing_queue
            WHERE state = 'queued'
            ORDER BY enqueued_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, order_id, status, event_type, body, attempts
        "#,
    )
    .fetch_optional(pool)
    .await
}

pub async fn mark_job_done(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE processing_queue SET state = 'done' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Return a failed message for redelivery, or dead-letter it once `attempts`
/// reaches `max_attempts`.
pub async fn mark_job_failed(
    pool: &PgPool,
    id: Uuid,
    max_attempts: i32,
    error: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE processing_queue
        SET state = CASE WHEN attempts >= $2 THEN 'dead' ELSE 'queued' END,
            last_error = $3,
            claimed_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(max_attempts)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Return claims whose consumer disappeared (claimed but never acked within
/// the visibility window) to the queue. Returns the number of rows requeued.
pub async fn requeue_stale_jobs(
    pool: &PgPool,
    stale_after_secs: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE processing_queue
        SET state = 'queued', claimed_at = NULL
        WHERE state = 'processing'
          AND claimed_at < now() - ($1 * interval '1 second')
        "#,
    )
    .bind(stale_after_secs)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
