use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};
use typed_builder::TypedBuilder;

use crate::common::logs::{actions, LogEntry};
use crate::common::{PerimeterId, SectorId, TenderId, UserId};
use crate::domains::reference::{PrestaType, SiaeKind, TenderAmount};

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tender_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TenderKind {
    /// Open call for tenders
    Tender,
    /// Quote request
    Quote,
    /// Sourcing project
    Project,
}

impl TenderKind {
    pub fn label(&self) -> &'static str {
        match self {
            TenderKind::Tender => "Appel d'offres",
            TenderKind::Quote => "Demande de devis",
            TenderKind::Project => "Projet d'achat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tender_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TenderStatus {
    Draft,
    Submitted,
    Validated,
    Sent,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "tender_source", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TenderSource {
    #[default]
    Form,
    Api,
    Tally,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "response_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseKind {
    Email,
    Tel,
    External,
}

/// Author answer to "did a transaction occur?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_answer", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionAnswer {
    Yes,
    No,
    DontKnow,
}

impl TransactionAnswer {
    pub const ALL: [TransactionAnswer; 3] = [Self::Yes, Self::No, Self::DontKnow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
            Self::DontKnow => "DONT_KNOW",
        }
    }
}

impl std::str::FromStr for TransactionAnswer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            "DONT_KNOW" => Ok(Self::DontKnow),
            other => Err(format!("unknown answer: {}", other)),
        }
    }
}

// ============================================================================
// Tender Model
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tender {
    pub id: TenderId,
    pub slug: String,
    pub kind: TenderKind,
    pub title: String,
    pub description: String,
    pub constraints: Option<String>,
    pub external_link: Option<String>,
    pub deadline_date: NaiveDate,
    pub start_working_date: Option<NaiveDate>,
    pub amount: Option<TenderAmount>,
    pub amount_exact: Option<i64>,
    pub accept_share_amount: bool,

    // Author and contact snapshot
    pub author_id: UserId,
    pub contact_first_name: String,
    pub contact_last_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub contact_company_name: Option<String>,
    pub contact_notifications_disabled: bool,

    // Targeting
    pub response_kind: Vec<ResponseKind>,
    pub siae_kind: Vec<SiaeKind>,
    pub presta_type: Vec<PrestaType>,
    pub sector_ids: Vec<SectorId>,
    pub is_country_area: bool,
    pub include_country_area: bool,
    pub perimeter_ids: Vec<PerimeterId>,
    pub location_id: Option<PerimeterId>,
    pub distance_location: Option<i32>,

    // Lifecycle
    pub status: TenderStatus,
    pub email_sent_for_modification: bool,
    pub send_to_commercial_partners_only: bool,
    pub limit_send_to_siae_batch: i32,
    pub limit_nb_siae_interested: i32,
    pub source: TenderSource,
    pub logs: Json<Vec<LogEntry>>,

    // Outcomes
    pub siae_transactioned: Option<bool>,
    pub survey_transactioned_answer: Option<TransactionAnswer>,
    pub survey_transactioned_send_date: Option<DateTime<Utc>>,
    pub survey_transactioned_answer_date: Option<DateTime<Utc>>,
    pub siae_list_last_seen_date: Option<DateTime<Utc>>,
    pub first_sent_at: Option<DateTime<Utc>>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub validated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub reminder_count: i32,
    pub reminder_last_update: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tender attributes accepted by submission and draft edits.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct TenderInput {
    pub kind: TenderKind,
    pub title: String,
    pub description: String,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub constraints: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub external_link: Option<String>,
    pub deadline_date: NaiveDate,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub start_working_date: Option<NaiveDate>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub amount: Option<TenderAmount>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub amount_exact: Option<i64>,
    #[builder(default = false)]
    #[serde(default)]
    pub accept_share_amount: bool,

    #[builder(default)]
    #[serde(default)]
    pub response_kind: Vec<ResponseKind>,
    #[builder(default)]
    #[serde(default)]
    pub siae_kind: Vec<SiaeKind>,
    #[builder(default)]
    #[serde(default)]
    pub presta_type: Vec<PrestaType>,
    #[builder(default)]
    #[serde(default)]
    pub sector_ids: Vec<SectorId>,

    #[builder(default = false)]
    #[serde(default)]
    pub is_country_area: bool,
    #[builder(default = false)]
    #[serde(default)]
    pub include_country_area: bool,
    #[builder(default)]
    #[serde(default)]
    pub perimeter_ids: Vec<PerimeterId>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub location_id: Option<PerimeterId>,
    /// Radius center named by slug, resolved to `location_id` on save.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub location_slug: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub distance_location: Option<i32>,

    /// Overrides the author's phone in the contact snapshot.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[builder(default = false)]
    #[serde(default)]
    pub contact_notifications_disabled: bool,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub limit_send_to_siae_batch: Option<i32>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub limit_nb_siae_interested: Option<i32>,

    /// Author questions, answered by suppliers when they declare interest.
    #[builder(default)]
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Author details copied onto the tender at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
}

/// Row to insert, after validation.
pub struct NewTender<'a> {
    pub id: TenderId,
    pub slug: &'a str,
    pub author_id: UserId,
    pub contact: &'a ContactSnapshot,
    pub input: &'a TenderInput,
    pub source: TenderSource,
    pub status: TenderStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogEntry>,
}

pub const DEFAULT_BATCH_SIZE: i32 = 10;
pub const DEFAULT_INTEREST_CAP: i32 = 5;

impl Tender {
    pub fn entries(&self) -> &[LogEntry] {
        &self.logs.0
    }

    /// Band used for comparisons: the declared band, else the band of the
    /// exact amount.
    pub fn amount_band(&self) -> Option<TenderAmount> {
        self.amount
            .or_else(|| self.amount_exact.map(TenderAmount::from_exact))
    }

    /// Amount shown publicly; hidden unless the author agreed to share it.
    pub fn amount_display(&self) -> Option<String> {
        if !self.accept_share_amount {
            return None;
        }
        match (self.amount_exact, self.amount) {
            (Some(exact), _) => Some(format!("{} €", group_thousands(exact))),
            (None, Some(band)) => Some(band.label().to_string()),
            (None, None) => None,
        }
    }

    /// Targeting and content no longer change once validated.
    pub fn is_frozen(&self) -> bool {
        self.validated_at.is_some()
    }

    pub fn contact_full_name(&self) -> String {
        format!("{} {}", self.contact_first_name, self.contact_last_name)
            .trim()
            .to_string()
    }

    pub fn url(&self, site_url: &str) -> String {
        format!("{}/besoins/{}", site_url, self.slug)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(id: TenderId, executor: E) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tenders WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_slug<'e, E: PgExecutor<'e>>(slug: &str, executor: E) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tenders WHERE slug = $1")
            .bind(slug)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    /// Row lock for a scheduler or dispatch pass. `None` when another pass
    /// holds the tender.
    pub async fn lock_for_pass(id: TenderId, conn: &mut PgConnection) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tenders WHERE id = $1 FOR UPDATE SKIP LOCKED")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(Into::into)
    }

    /// Blocking row lock, for short interactive transactions.
    pub async fn lock(id: TenderId, conn: &mut PgConnection) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM tenders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(new: NewTender<'_>, executor: E) -> Result<Self> {
        let input = new.input;
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO tenders (
                id, slug, kind, title, description, constraints, external_link,
                deadline_date, start_working_date, amount, amount_exact, accept_share_amount,
                author_id, contact_first_name, contact_last_name, contact_email, contact_phone,
                contact_company_name, contact_notifications_disabled,
                response_kind, siae_kind, presta_type, sector_ids,
                is_country_area, include_country_area, perimeter_ids, location_id, distance_location,
                status, limit_send_to_siae_batch, limit_nb_siae_interested, source, logs, published_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17,
                $18, $19,
                $20, $21, $22, $23,
                $24, $25, $26, $27, $28,
                $29, $30, $31, $32, $33, $34
            )
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(new.slug)
        .bind(input.kind)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.constraints)
        .bind(&input.external_link)
        .bind(input.deadline_date)
        .bind(input.start_working_date)
        .bind(input.amount)
        .bind(input.amount_exact)
        .bind(input.accept_share_amount)
        .bind(new.author_id)
        .bind(&new.contact.first_name)
        .bind(&new.contact.last_name)
        .bind(&new.contact.email)
        .bind(&new.contact.phone)
        .bind(&new.contact.company_name)
        .bind(input.contact_notifications_disabled)
        .bind(&input.response_kind)
        .bind(&input.siae_kind)
        .bind(&input.presta_type)
        .bind(&input.sector_ids)
        .bind(input.is_country_area)
        .bind(input.include_country_area)
        .bind(&input.perimeter_ids)
        .bind(input.location_id)
        .bind(input.distance_location)
        .bind(new.status)
        .bind(input.limit_send_to_siae_batch.unwrap_or(DEFAULT_BATCH_SIZE))
        .bind(input.limit_nb_siae_interested.unwrap_or(DEFAULT_INTEREST_CAP))
        .bind(new.source)
        .bind(Json(&new.logs))
        .bind(new.published_at)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Author edit. Only applies while DRAFT and never validated; clears the
    /// modification-request flag.
    pub async fn update_draft<'e, E: PgExecutor<'e>>(
        id: TenderId,
        input: &TenderInput,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenders SET
                kind = $2, title = $3, description = $4, constraints = $5, external_link = $6,
                deadline_date = $7, start_working_date = $8, amount = $9, amount_exact = $10,
                accept_share_amount = $11, response_kind = $12, siae_kind = $13, presta_type = $14,
                sector_ids = $15, is_country_area = $16, include_country_area = $17,
                perimeter_ids = $18, location_id = $19, distance_location = $20,
                contact_phone = COALESCE($21, contact_phone),
                contact_notifications_disabled = $22,
                limit_send_to_siae_batch = COALESCE($23, limit_send_to_siae_batch),
                limit_nb_siae_interested = COALESCE($24, limit_nb_siae_interested),
                email_sent_for_modification = false,
                updated_at = NOW()
            WHERE id = $1 AND status = 'DRAFT' AND validated_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.kind)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.constraints)
        .bind(&input.external_link)
        .bind(input.deadline_date)
        .bind(input.start_working_date)
        .bind(input.amount)
        .bind(input.amount_exact)
        .bind(input.accept_share_amount)
        .bind(&input.response_kind)
        .bind(&input.siae_kind)
        .bind(&input.presta_type)
        .bind(&input.sector_ids)
        .bind(input.is_country_area)
        .bind(input.include_country_area)
        .bind(&input.perimeter_ids)
        .bind(input.location_id)
        .bind(input.distance_location)
        .bind(&input.contact_phone)
        .bind(input.contact_notifications_disabled)
        .bind(input.limit_send_to_siae_batch)
        .bind(input.limit_nb_siae_interested)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    // ------------------------------------------------------------------------
    // Lifecycle transitions (conditional on the source status)
    // ------------------------------------------------------------------------

    pub async fn mark_submitted<'e, E: PgExecutor<'e>>(
        id: TenderId,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<Option<Self>> {
        let entry = LogEntry::new(actions::SUBMITTED, now);
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenders
            SET status = 'SUBMITTED', published_at = $2,
                logs = logs || $3::jsonb, updated_at = NOW()
            WHERE id = $1 AND status = 'DRAFT'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_validated<'e, E: PgExecutor<'e>>(
        id: TenderId,
        now: DateTime<Utc>,
        partners_only: bool,
        validated_by: UserId,
        executor: E,
    ) -> Result<Option<Self>> {
        let entry = LogEntry::new(actions::VALIDATED, now)
            .with("user_id", validated_by.to_string())
            .with("send_to_commercial_partners_only", partners_only);
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenders
            SET status = 'VALIDATED', validated_at = $2, send_to_commercial_partners_only = $3,
                logs = logs || $4::jsonb, updated_at = NOW()
            WHERE id = $1 AND status = 'SUBMITTED' AND cardinality(sector_ids) > 0
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(partners_only)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_modification_requested<'e, E: PgExecutor<'e>>(
        id: TenderId,
        now: DateTime<Utc>,
        message: &str,
        executor: E,
    ) -> Result<Option<Self>> {
        let entry = LogEntry::new(actions::MODIFICATION_REQUEST, now).with("message", message);
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenders
            SET status = 'DRAFT', email_sent_for_modification = true,
                logs = logs || $2::jsonb, updated_at = NOW()
            WHERE id = $1 AND status = 'SUBMITTED'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    /// Move to REJECTED from one of `from`.
    pub async fn mark_rejected<'e, E: PgExecutor<'e>>(
        id: TenderId,
        from: &[TenderStatus],
        entry: &LogEntry,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenders
            SET status = 'REJECTED', logs = logs || $3::jsonb, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    /// Move a draft to REJECTED only while it still awaits the author's
    /// changes. An author save clears the flag and cancels the rejection.
    pub async fn mark_auto_rejected<'e, E: PgExecutor<'e>>(
        id: TenderId,
        from: &[TenderStatus],
        entry: &LogEntry,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenders
            SET status = 'REJECTED', logs = logs || $3::jsonb, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2) AND email_sent_for_modification = true
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(entry.as_append_payload())
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    /// End of a dispatch pass: SENT, first send kept, last send moved.
    pub async fn mark_sent<'e, E: PgExecutor<'e>>(
        id: TenderId,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tenders
            SET status = 'SENT', first_sent_at = COALESCE(first_sent_at, $2),
                last_sent_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn append_log<'e, E: PgExecutor<'e>>(
        id: TenderId,
        entry: &LogEntry,
        executor: E,
    ) -> Result<()> {
        sqlx::query("UPDATE tenders SET logs = logs || $2::jsonb WHERE id = $1")
            .bind(id)
            .bind(entry.as_append_payload())
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Append `entry` unless the tender already logged the same action.
    pub async fn append_log_once<'e, E: PgExecutor<'e>>(
        id: TenderId,
        entry: &LogEntry,
        executor: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tenders SET logs = logs || $2::jsonb WHERE id = $1 AND NOT logs @> $3::jsonb",
        )
        .bind(id)
        .bind(entry.as_append_payload())
        .bind(LogEntry::action_pattern(&entry.action))
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ------------------------------------------------------------------------
    // Outcome fields (first writer wins)
    // ------------------------------------------------------------------------

    pub async fn record_author_survey_answer<'e, E: PgExecutor<'e>>(
        id: TenderId,
        answer: TransactionAnswer,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<Option<Self>> {
        let entry = LogEntry::new(actions::SURVEY_AUTHOR_ANSWER, now).with("answer", answer.as_str());
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tenders
            SET survey_transactioned_answer = $2, survey_transactioned_answer_date = $3,
                logs = logs || $4::jsonb, updated_at = NOW()
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

    /// Returns whether the tender outcome was still open and got written.
    pub async fn set_siae_transactioned_if_unset<'e, E: PgExecutor<'e>>(
        id: TenderId,
        value: bool,
        executor: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tenders SET siae_transactioned = $2, updated_at = NOW() WHERE id = $1 AND siae_transactioned IS NULL",
        )
        .bind(id)
        .bind(value)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn stamp_author_survey_sent<'e, E: PgExecutor<'e>>(
        id: TenderId,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<bool> {
        let entry = LogEntry::new(actions::EMAIL_SURVEY_AUTHOR, now);
        let result = sqlx::query(
            r#"
            UPDATE tenders
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

    pub async fn bump_survey_reminder<'e, E: PgExecutor<'e>>(
        id: TenderId,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<bool> {
        let entry = LogEntry::new(actions::EMAIL_SURVEY_AUTHOR_REMINDER, now);
        let result = sqlx::query(
            r#"
            UPDATE tenders
            SET reminder_count = reminder_count + 1, reminder_last_update = $2,
                logs = logs || $3::jsonb
            WHERE id = $1 AND reminder_count = 0 AND survey_transactioned_answer IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(entry.as_append_payload())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn touch_siae_list_seen<'e, E: PgExecutor<'e>>(
        id: TenderId,
        now: DateTime<Utc>,
        executor: E,
    ) -> Result<()> {
        sqlx::query("UPDATE tenders SET siae_list_last_seen_date = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Scheduler selections
    // ------------------------------------------------------------------------

    pub async fn ids_awaiting_initial_dispatch<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<TenderId>> {
        sqlx::query_scalar::<_, TenderId>(
            "SELECT id FROM tenders WHERE status = 'VALIDATED' ORDER BY validated_at, id",
        )
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// SENT tenders eligible for another batch: interval elapsed, still open,
    /// below their interest cap, not restricted to partners.
    pub async fn ids_due_for_top_up<'e, E: PgExecutor<'e>>(
        sent_before: DateTime<Utc>,
        today: NaiveDate,
        executor: E,
    ) -> Result<Vec<TenderId>> {
        sqlx::query_scalar::<_, TenderId>(
            r#"
            SELECT t.id FROM tenders t
            WHERE t.status = 'SENT'
              AND t.send_to_commercial_partners_only = false
              AND t.last_sent_at <= $1
              AND t.deadline_date >= $2
              AND (
                SELECT COUNT(*) FROM tender_siaes ts
                WHERE ts.tender_id = t.id AND ts.detail_contact_click_date IS NOT NULL
              ) < t.limit_nb_siae_interested
            ORDER BY t.last_sent_at, t.id
            "#,
        )
        .bind(sent_before)
        .bind(today)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn ids_for_top_suppliers<'e, E: PgExecutor<'e>>(
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        executor: E,
    ) -> Result<Vec<TenderId>> {
        sqlx::query_scalar::<_, TenderId>(
            r#"
            SELECT t.id FROM tenders t
            WHERE t.status = 'SENT'
              AND t.first_sent_at >= $1 AND t.first_sent_at < $2
              AND t.contact_notifications_disabled = false
              AND NOT t.logs @> $3::jsonb
              AND NOT EXISTS (
                SELECT 1 FROM tender_siaes ts
                WHERE ts.tender_id = t.id AND ts.detail_contact_click_date IS NOT NULL
              )
            ORDER BY t.first_sent_at, t.id
            "#,
        )
        .bind(from)
        .bind(until)
        .bind(LogEntry::action_pattern(actions::EMAIL_TOP_SUPPLIERS))
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn ids_for_author_survey<'e, E: PgExecutor<'e>>(
        deadline: NaiveDate,
        executor: E,
    ) -> Result<Vec<TenderId>> {
        sqlx::query_scalar::<_, TenderId>(
            r#"
            SELECT id FROM tenders
            WHERE status = 'SENT'
              AND survey_transactioned_answer IS NULL
              AND survey_transactioned_send_date IS NULL
              AND deadline_date = $1
            ORDER BY id
            "#,
        )
        .bind(deadline)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn ids_for_author_survey_reminder<'e, E: PgExecutor<'e>>(
        start: NaiveDate,
        executor: E,
    ) -> Result<Vec<TenderId>> {
        sqlx::query_scalar::<_, TenderId>(
            r#"
            SELECT id FROM tenders
            WHERE status = 'SENT'
              AND survey_transactioned_answer IS NULL
              AND reminder_count = 0
              AND start_working_date = $1
            ORDER BY id
            "#,
        )
        .bind(start)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn ids_for_supplier_survey<'e, E: PgExecutor<'e>>(
        start: NaiveDate,
        executor: E,
    ) -> Result<Vec<TenderId>> {
        sqlx::query_scalar::<_, TenderId>(
            r#"
            SELECT id FROM tenders
            WHERE status = 'SENT'
              AND siae_transactioned IS NULL
              AND start_working_date = $1
            ORDER BY id
            "#,
        )
        .bind(start)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Drafts sent back to their author for changes.
    pub async fn find_awaiting_modification<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM tenders WHERE status = 'DRAFT' AND email_sent_for_modification = true ORDER BY id",
        )
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}
