//! Transaction surveys sent to authors and interested suppliers.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use crate::common::logs::{actions, LogEntry};
use crate::common::{EngineError, EngineResult, SiaeId, TenderId};
use crate::domains::reference::gateway;
use crate::domains::tenders::emails::EmailComposer;
use crate::domains::tenders::models::{Tender, TenderSiae};
use crate::kernel::{deliver_all, run_tenders, EmailEvent, EmailKind, PassBudget, PassSummary, ServerDeps};

/// Days after the deadline before asking the author.
pub const AUTHOR_SURVEY_DELAY_DAYS: i64 = 7;
/// Days after the work started before asking interested suppliers.
pub const SUPPLIER_SURVEY_DELAY_DAYS: i64 = 7;

#[instrument(skip(deps))]
pub async fn send_author_surveys(now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    let deadline = now.date_naive() - Duration::days(AUTHOR_SURVEY_DELAY_DAYS);
    let tender_ids = Tender::ids_for_author_survey(deadline, &deps.db_pool).await?;

    let summary = run_tenders(
        "author_survey",
        tender_ids,
        deps.settings.worker_concurrency,
        PassBudget::from_secs(deps.settings.pass_budget_secs),
        move |tender_id| author_survey_for(tender_id, EmailKind::AuthorSurvey, now, deps),
    )
    .await;

    info!(processed = summary.processed, emails = summary.emails, "Author surveys sent");
    Ok(summary)
}

/// Single reminder, the day after the work was due to start.
#[instrument(skip(deps))]
pub async fn send_author_survey_reminders(now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    let start = now.date_naive() - Duration::days(1);
    let tender_ids = Tender::ids_for_author_survey_reminder(start, &deps.db_pool).await?;

    let summary = run_tenders(
        "author_survey_reminder",
        tender_ids,
        deps.settings.worker_concurrency,
        PassBudget::from_secs(deps.settings.pass_budget_secs),
        move |tender_id| author_survey_for(tender_id, EmailKind::AuthorSurveyReminder, now, deps),
    )
    .await;

    info!(processed = summary.processed, emails = summary.emails, "Author survey reminders sent");
    Ok(summary)
}

async fn author_survey_for(
    tender_id: TenderId,
    kind: EmailKind,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<usize> {
    let pool = &deps.db_pool;
    let tender = Tender::find_by_id(tender_id, pool)
        .await?
        .ok_or_else(|| EngineError::not_found("Tender", tender_id))?;

    let event = EmailComposer::new(deps).author_survey(kind, &tender)?;

    let claimed = match kind {
        EmailKind::AuthorSurveyReminder => Tender::bump_survey_reminder(tender.id, now, pool).await?,
        _ => Tender::stamp_author_survey_sent(tender.id, now, pool).await?,
    };
    if !claimed {
        return Ok(0);
    }

    Ok(deliver_all(deps.email.as_ref(), &[event]).await.sent)
}

#[instrument(skip(deps))]
pub async fn send_supplier_surveys(now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    let start = now.date_naive() - Duration::days(SUPPLIER_SURVEY_DELAY_DAYS);
    let tender_ids = Tender::ids_for_supplier_survey(start, &deps.db_pool).await?;

    let summary = run_tenders(
        "supplier_survey",
        tender_ids,
        deps.settings.worker_concurrency,
        PassBudget::from_secs(deps.settings.pass_budget_secs),
        move |tender_id| supplier_surveys_for(tender_id, now, deps),
    )
    .await;

    info!(processed = summary.processed, emails = summary.emails, "Supplier surveys sent");
    Ok(summary)
}

async fn supplier_surveys_for(tender_id: TenderId, now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<usize> {
    let pool = &deps.db_pool;
    let tender = Tender::find_by_id(tender_id, pool)
        .await?
        .ok_or_else(|| EngineError::not_found("Tender", tender_id))?;

    let edges = TenderSiae::find_for_supplier_survey(tender.id, pool).await?;
    let siae_ids: Vec<SiaeId> = edges.iter().map(|e| e.siae_id).collect();
    let suppliers = gateway::suppliers_by_ids(&siae_ids, pool).await?;

    let composer = EmailComposer::new(deps);
    let entry = LogEntry::new(actions::EMAIL_SURVEY_SIAE, now);
    let mut events: Vec<EmailEvent> = Vec::new();

    for edge in &edges {
        let Some(supplier) = suppliers.iter().find(|s| s.id == edge.siae_id) else {
            warn!(siae_id = %edge.siae_id, "Supplier gone, survey skipped");
            continue;
        };
        // The user who declared interest answers; otherwise the first member.
        let user = edge
            .user_id
            .and_then(|id| supplier.users.iter().find(|u| u.id == id))
            .or_else(|| supplier.users.first());
        let Some(user) = user else {
            warn!(tender_siae_id = %edge.id, "Supplier has no user to sign the survey for");
            continue;
        };

        let event = composer.supplier_survey(&tender, edge.id, supplier, user.id, &user.email)?;
        if TenderSiae::stamp_survey_sent(edge.id, now, &entry, pool).await? {
            events.push(event);
        }
    }

    Ok(deliver_all(deps.email.as_ref(), &events).await.sent)
}
