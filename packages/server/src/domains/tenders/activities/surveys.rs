//! Signed transaction-survey answers.
//!
//! Both endpoints are reached from an email link without a session. The token
//! names the user and what they may answer; the answer is written only while
//! the field is still empty.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::submission::find_tender;
use crate::common::logs::{actions, LogEntry};
use crate::common::{EngineError, EngineResult};
use crate::domains::auth::SurveyPurpose;
use crate::domains::reference::gateway::is_author_of;
use crate::domains::reference::Siae;
use crate::domains::tenders::models::{Tender, TenderSiae, TransactionAnswer};
use crate::kernel::ServerDeps;

#[instrument(skip(token, deps))]
pub async fn answer_author_survey(
    slug: &str,
    answer: TransactionAnswer,
    token: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<Tender> {
    let tender = find_tender(slug, deps).await?;

    let user_id = deps
        .jwt_service
        .verify_survey_token(token, SurveyPurpose::AuthorTransaction { tender_id: tender.id })
        .map_err(|e| {
            warn!(error = %e, "Rejected author survey token");
            EngineError::forbidden("invalid or expired survey link")
        })?;
    if !is_author_of(user_id, tender.id, &deps.db_pool).await? {
        return Err(EngineError::forbidden("survey link issued for another user"));
    }

    let updated = Tender::record_author_survey_answer(tender.id, answer, now, &deps.db_pool)
        .await?
        .ok_or_else(|| EngineError::conflict("survey answer already recorded"))?;

    info!(tender_id = %updated.id, answer = answer.as_str(), "Author survey answered");
    Ok(updated)
}

#[instrument(skip(token, deps))]
pub async fn answer_supplier_survey(
    slug: &str,
    siae_slug: &str,
    answer: bool,
    token: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<TenderSiae> {
    let pool = &deps.db_pool;
    let tender = find_tender(slug, deps).await?;
    let siae = Siae::find_by_slug(siae_slug, pool)
        .await?
        .ok_or_else(|| EngineError::not_found("Siae", siae_slug))?;

    let purpose = SurveyPurpose::SupplierTransaction {
        tender_id: tender.id,
        siae_id: siae.id,
    };
    let user_id = deps
        .jwt_service
        .verify_survey_token(token, purpose)
        .map_err(|e| {
            warn!(error = %e, "Rejected supplier survey token");
            EngineError::forbidden("invalid or expired survey link")
        })?;
    if !Siae::has_user(siae.id, user_id, pool).await? {
        return Err(EngineError::forbidden("user does not belong to this supplier"));
    }

    let edge = TenderSiae::find(tender.id, siae.id, pool)
        .await?
        .ok_or_else(|| EngineError::not_found("TenderSiae", format!("{}/{}", tender.slug, siae.slug)))?;

    let entry = LogEntry::new(actions::SURVEY_SIAE_ANSWER, now)
        .with("answer", answer)
        .with("user_id", user_id.to_string());

    let mut tx = pool.begin().await?;
    let Some(updated) = TenderSiae::record_survey_answer(edge.id, answer, now, &entry, &mut *tx).await? else {
        tx.rollback().await?;
        return Err(EngineError::conflict("survey answer already recorded"));
    };
    let tender_written = Tender::set_siae_transactioned_if_unset(tender.id, answer, &mut *tx).await?;
    tx.commit().await?;

    info!(
        tender_id = %tender.id,
        siae_id = %siae.id,
        answer,
        tender_written,
        "Supplier survey answered"
    );
    Ok(updated)
}
