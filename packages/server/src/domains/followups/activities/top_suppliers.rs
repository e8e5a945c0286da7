//! The day after the first dispatch, authors without any interested
//! supplier get a short list of the best matches.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::common::logs::{actions, LogEntry};
use crate::common::{EngineError, EngineResult, TenderId};
use crate::domains::followups::windows::{is_weekday, reminder_window};
use crate::domains::matching::{load_targeting, match_suppliers};
use crate::domains::reference::PassSnapshot;
use crate::domains::tenders::emails::EmailComposer;
use crate::domains::tenders::models::Tender;
use crate::kernel::{deliver_all, run_tenders, PassBudget, PassSummary, ServerDeps};

pub const TOP_SUPPLIERS_COUNT: usize = 5;

#[instrument(skip(deps))]
pub async fn send_top_suppliers(now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    if !is_weekday(now) {
        debug!("Top suppliers email only goes out on weekdays");
        return Ok(PassSummary::default());
    }

    let (from, until) = reminder_window(now, 1);
    let tender_ids = Tender::ids_for_top_suppliers(from, until, &deps.db_pool).await?;
    if tender_ids.is_empty() {
        return Ok(PassSummary::default());
    }

    let snapshot = PassSnapshot::new();
    let snapshot = &snapshot;
    let summary = run_tenders(
        "top_suppliers",
        tender_ids,
        deps.settings.worker_concurrency,
        PassBudget::from_secs(deps.settings.pass_budget_secs),
        move |tender_id| top_suppliers_for(tender_id, now, snapshot, deps),
    )
    .await;

    info!(processed = summary.processed, emails = summary.emails, "Top suppliers sent");
    Ok(summary)
}

async fn top_suppliers_for(
    tender_id: TenderId,
    now: DateTime<Utc>,
    snapshot: &PassSnapshot,
    deps: &ServerDeps,
) -> EngineResult<usize> {
    let pool = &deps.db_pool;
    let tender = Tender::find_by_id(tender_id, pool)
        .await?
        .ok_or_else(|| EngineError::not_found("Tender", tender_id))?;

    let targeting = load_targeting(&tender, pool).await?;
    let suppliers = snapshot.suppliers(pool).await?;
    let top: Vec<_> = match_suppliers(&targeting, &suppliers)
        .into_iter()
        .take(TOP_SUPPLIERS_COUNT)
        .collect();
    if top.is_empty() {
        debug!(tender_id = %tender_id, "No supplier to suggest");
        return Ok(0);
    }

    let entry = LogEntry::new(actions::EMAIL_TOP_SUPPLIERS, now).with("count", top.len());
    if !Tender::append_log_once(tender.id, &entry, pool).await? {
        return Ok(0);
    }

    let event = EmailComposer::new(deps).author_top_suppliers(&tender, &top);
    Ok(deliver_all(deps.email.as_ref(), &[event]).await.sent)
}
