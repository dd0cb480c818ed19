//! Idempotency ledger for payment provider callbacks.

use sqlx::PgExecutor;

/// Records an event id. Returns `false` when it was already processed.
pub async fn record_event<'e>(
    db: impl PgExecutor<'e>,
    event_id: &str,
    provider: &str,
    event_type: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, provider, event_type, processed_at) \
         VALUES ($1, $2, $3, NOW()) ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(provider)
    .bind(event_type)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}
