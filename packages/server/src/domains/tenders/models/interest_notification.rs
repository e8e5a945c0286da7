use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::common::TenderId;

/// Claim on an interest count for which the author was notified.
pub struct InterestNotification;

impl InterestNotification {
    /// Claim `count` for the tender. Only the first claim of a count
    /// succeeds, whatever the interleaving of callers.
    pub async fn claim<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        count: i64,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO tender_interest_notifications (tender_id, interested_count, notified_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (tender_id, interested_count) DO NOTHING
            "#,
        )
        .bind(tender_id)
        .bind(count as i32)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn counts_for_tender<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        executor: E,
    ) -> Result<Vec<i32>> {
        sqlx::query_scalar::<_, i32>(
            "SELECT interested_count FROM tender_interest_notifications WHERE tender_id = $1 ORDER BY interested_count",
        )
        .bind(tender_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}
