use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};

use crate::common::logs::LogEntry;
use crate::common::{SiaeId, TenderId, TenderSiaeId, UserId};

/// How a supplier came to be attached to a tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tender_siae_source", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TenderSiaeSource {
    Matching,
    Ai,
    /// Supplier user opened a tender it was not targeted for
    Link,
    Manual,
}

/// One supplier's journey on one tender.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenderSiae {
    pub id: TenderSiaeId,
    pub tender_id: TenderId,
    pub siae_id: SiaeId,
    pub user_id: Option<UserId>,
    pub source: TenderSiaeSource,

    pub email_send_date: Option<DateTime<Utc>>,
    pub email_link_click_date: Option<DateTime<Utc>>,
    pub detail_display_date: Option<DateTime<Utc>>,
    pub detail_contact_click_date: Option<DateTime<Utc>>,
    pub detail_not_interested_click_date: Option<DateTime<Utc>>,
    pub detail_not_interested_feedback: Option<String>,

    pub survey_transactioned_answer: Option<bool>,
    pub survey_transactioned_send_date: Option<DateTime<Utc>>,
    pub survey_transactioned_answer_date: Option<DateTime<Utc>>,
    pub transactioned: Option<bool>,
    pub transactioned_source: Option<String>,

    pub logs: Json<Vec<LogEntry>>,
    pub is_deleted_by_siae: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-tender funnel counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenderStats {
    pub targeted: i64,
    pub emailed: i64,
    pub clicked: i64,
    pub viewed: i64,
    pub interested: i64,
    pub not_interested: i64,
}

impl TenderSiae {
    pub fn entries(&self) -> &[LogEntry] {
        &self.logs.0
    }

    pub fn is_interested(&self) -> bool {
        self.detail_contact_click_date.is_some()
    }

    pub fn is_not_interested(&self) -> bool {
        self.detail_not_interested_click_date.is_some()
    }

    pub fn has_decided(&self) -> bool {
        self.is_interested() || self.is_not_interested()
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        id: TenderSiaeId,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tender_siaes WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        siae_id: SiaeId,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tender_siaes WHERE tender_id = $1 AND siae_id = $2")
            .bind(tender_id)
            .bind(siae_id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find_for_tender<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tender_siaes WHERE tender_id = $1 ORDER BY created_at, id")
            .bind(tender_id)
            .fetch_all(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find_interested<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM tender_siaes
            WHERE tender_id = $1 AND detail_contact_click_date IS NOT NULL
            ORDER BY detail_contact_click_date, id
            "#,
        )
        .bind(tender_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Attach MATCHING edges for suppliers not yet on the tender.
    /// Returns the number of edges created.
    pub async fn insert_matched(
        tender_id: TenderId,
        siae_ids: &[SiaeId],
        conn: &mut PgConnection,
    ) -> Result<u64> {
        if siae_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<TenderSiaeId> = siae_ids.iter().map(|_| TenderSiaeId::new()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO tender_siaes (id, tender_id, siae_id, source)
            SELECT edge.id, $1, edge.siae_id, 'MATCHING'
            FROM UNNEST($2::uuid[], $3::uuid[]) AS edge(id, siae_id)
            ON CONFLICT (tender_id, siae_id) DO NOTHING
            "#,
        )
        .bind(tender_id)
        .bind(&ids)
        .bind(siae_ids)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Edges a dispatch batch may still email: not stamped, no decision yet.
    pub async fn find_unsent<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM tender_siaes
            WHERE tender_id = $1
              AND email_send_date IS NULL
              AND detail_contact_click_date IS NULL
              AND detail_not_interested_click_date IS NULL
            "#,
        )
        .bind(tender_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Stamp `email_send_date` on edges that are still unstamped; returns the
    /// edges this call stamped.
    pub async fn stamp_email_sent(
        ids: &[TenderSiaeId],
        now: DateTime<Utc>,
        entry: &LogEntry,
        conn: &mut PgConnection,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tender_siaes
            SET email_send_date = $2, logs = logs || $3::jsonb, updated_at = NOW()
            WHERE id = ANY($1) AND email_send_date IS NULL
            RETURNING *
            "#,
        )
        .bind(ids)
        .bind(now)
        .bind(entry.as_append_payload())
        .fetch_all(conn)
        .await
        .map_err(Into::into)
    }

    /// Edge for a supplier user who opened a tender on their own.
    pub async fn ensure_link_edge<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        siae_id: SiaeId,
        user_id: UserId,
        executor: E,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tender_siaes (id, tender_id, siae_id, user_id, source)
            VALUES ($1, $2, $3, $4, 'LINK')
            ON CONFLICT (tender_id, siae_id) DO NOTHING
            "#,
        )
        .bind(TenderSiaeId::new())
        .bind(tender_id)
        .bind(siae_id)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Interaction stamps: every date is written once and then kept.
    // ------------------------------------------------------------------------

    /// Email deep link opened: click and display, plus the responding user.
    pub async fn mark_link_clicked<'e, E: PgExecutor<'e>>(
        id: TenderSiaeId,
        now: DateTime<Utc>,
        user_id: Option<UserId>,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tender_siaes
            SET email_link_click_date = COALESCE(email_link_click_date, $2),
                detail_display_date = CASE WHEN (email_send_date IS NOT NULL OR source IN ('LINK', 'MANUAL'))
                    THEN COALESCE(detail_display_date, $2) ELSE detail_display_date END,
                user_id = COALESCE(user_id, $3),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    /// Detail page seen by a member of the supplier. MATCHING edges still
    /// waiting for their batch are left alone.
    pub async fn mark_displayed<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        siae_ids: &[SiaeId],
        user_id: UserId,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tender_siaes
            SET detail_display_date = $3, user_id = COALESCE(user_id, $4), updated_at = NOW()
            WHERE tender_id = $1 AND siae_id = ANY($2) AND detail_display_date IS NULL
              AND (email_send_date IS NOT NULL OR source IN ('LINK', 'MANUAL'))
            "#,
        )
        .bind(tender_id)
        .bind(siae_ids)
        .bind(now)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Interested, unless the supplier already made a decision.
    pub async fn mark_interested<'e, E: PgExecutor<'e>>(
        id: TenderSiaeId,
        now: DateTime<Utc>,
        user_id: Option<UserId>,
        entry: &LogEntry,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tender_siaes
            SET detail_contact_click_date = $2,
                detail_display_date = CASE WHEN (email_send_date IS NOT NULL OR source IN ('LINK', 'MANUAL'))
                    THEN COALESCE(detail_display_date, $2) ELSE detail_display_date END,
                user_id = COALESCE(user_id, $3),
                logs = logs || $4::jsonb,
                updated_at = NOW()
            WHERE id = $1
              AND detail_contact_click_date IS NULL
              AND detail_not_interested_click_date IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(user_id)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_not_interested<'e, E: PgExecutor<'e>>(
        id: TenderSiaeId,
        now: DateTime<Utc>,
        feedback: Option<&str>,
        user_id: Option<UserId>,
        entry: &LogEntry,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tender_siaes
            SET detail_not_interested_click_date = $2,
                detail_not_interested_feedback = $3,
                detail_display_date = CASE WHEN (email_send_date IS NOT NULL OR source IN ('LINK', 'MANUAL'))
                    THEN COALESCE(detail_display_date, $2) ELSE detail_display_date END,
                user_id = COALESCE(user_id, $4),
                logs = logs || $5::jsonb,
                updated_at = NOW()
            WHERE id = $1
              AND detail_contact_click_date IS NULL
              AND detail_not_interested_click_date IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(feedback)
        .bind(user_id)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn count_interested<'e, E: PgExecutor<'e>>(tender_id: TenderId, executor: E) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tender_siaes WHERE tender_id = $1 AND detail_contact_click_date IS NOT NULL",
        )
        .bind(tender_id)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn hide_for_siae<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        siae_ids: &[SiaeId],
        executor: E,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tender_siaes SET is_deleted_by_siae = true, updated_at = NOW()
            WHERE tender_id = $1 AND siae_id = ANY($2) AND is_deleted_by_siae = false
            "#,
        )
        .bind(tender_id)
        .bind(siae_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------------
    // Reminders
    // ------------------------------------------------------------------------

    /// Emailed edges of SENT tenders, not clicked, no decision, not hidden,
    /// emailed inside `[from, until)` and not yet reminded with `action`.
    pub async fn find_click_reminder_due<'e, E: PgExecutor<'e>>(
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        action: &str,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT ts.* FROM tender_siaes ts
            INNER JOIN tenders t ON t.id = ts.tender_id
            WHERE t.status = 'SENT'
              AND ts.email_send_date >= $1 AND ts.email_send_date < $2
              AND ts.email_link_click_date IS NULL
              AND ts.detail_contact_click_date IS NULL
              AND ts.detail_not_interested_click_date IS NULL
              AND ts.is_deleted_by_siae = false
              AND NOT ts.logs @> $3::jsonb
            ORDER BY ts.tender_id, ts.email_send_date, ts.id
            "#,
        )
        .bind(from)
        .bind(until)
        .bind(LogEntry::action_pattern(action))
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Edges that declared interest inside `[from, until)`, not yet reminded.
    pub async fn find_interest_reminder_due<'e, E: PgExecutor<'e>>(
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        action: &str,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT ts.* FROM tender_siaes ts
            INNER JOIN tenders t ON t.id = ts.tender_id
            WHERE t.status = 'SENT'
              AND ts.detail_contact_click_date >= $1 AND ts.detail_contact_click_date < $2
              AND ts.is_deleted_by_siae = false
              AND NOT ts.logs @> $3::jsonb
            ORDER BY ts.tender_id, ts.detail_contact_click_date, ts.id
            "#,
        )
        .bind(from)
        .bind(until)
        .bind(LogEntry::action_pattern(action))
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Append `entry` unless an entry with the same action exists.
    /// Returns whether this call appended it.
    pub async fn append_log_once<'e, E: PgExecutor<'e>>(
        id: TenderSiaeId,
        entry: &LogEntry,
        executor: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tender_siaes SET logs = logs || $2::jsonb
            WHERE id = $1 AND NOT logs @> $3::jsonb
            "#,
        )
        .bind(id)
        .bind(entry.as_append_payload())
        .bind(LogEntry::action_pattern(&entry.action))
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ------------------------------------------------------------------------
    // Supplier transaction survey
    // ------------------------------------------------------------------------

    /// Interested, visible edges not surveyed yet.
    pub async fn find_for_supplier_survey<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM tender_siaes
            WHERE tender_id = $1
              AND detail_contact_click_date IS NOT NULL
              AND survey_transactioned_send_date IS NULL
              AND is_deleted_by_siae = false
            ORDER BY detail_contact_click_date, id
            "#,
        )
        .bind(tender_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn stamp_survey_sent<'e, E: PgExecutor<'e>>(
        id: TenderSiaeId,
        now: DateTime<Utc>,
        entry: &LogEntry,
        executor: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tender_siaes
            SET survey_transactioned_send_date = $2, logs = logs || $3::jsonb
            WHERE id = $1 AND survey_transactioned_send_date IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(entry.as_append_payload())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Supplier answer. `transactioned` follows the answer unless another
    /// source already set it.
    pub async fn record_survey_answer<'e, E: PgExecutor<'e>>(
        id: TenderSiaeId,
        answer: bool,
        now: DateTime<Utc>,
        entry: &LogEntry,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tender_siaes
            SET survey_transactioned_answer = $2,
                survey_transactioned_answer_date = $3,
                transactioned = COALESCE(transactioned, $2),
                transactioned_source = COALESCE(transactioned_source, 'SIAE_SURVEY'),
                logs = logs || $4::jsonb,
                updated_at = NOW()
            WHERE id = $1 AND survey_transactioned_answer IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(answer)
        .bind(now)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn stats<'e, E: PgExecutor<'e>>(tender_id: TenderId, executor: E) -> Result<TenderStats> {
        sqlx::query_as::<_, TenderStats>(
            r#"
            SELECT
                COUNT(*) AS targeted,
                COUNT(email_send_date) AS emailed,
                COUNT(email_link_click_date) AS clicked,
                COUNT(detail_display_date) AS viewed,
                COUNT(detail_contact_click_date) AS interested,
                COUNT(detail_not_interested_click_date) AS not_interested
            FROM tender_siaes
            WHERE tender_id = $1
            "#,
        )
        .bind(tender_id)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }
}
