//! Drafts sent back for changes and left untouched are closed after ten days.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use crate::common::logs::{actions, last_with_action, LogEntry};
use crate::common::EngineResult;
use crate::domains::tenders::emails::EmailComposer;
use crate::domains::tenders::machines::TenderTransition;
use crate::domains::tenders::models::Tender;
use crate::kernel::{deliver_all, PassBudget, PassSummary, ServerDeps};

pub const AUTO_REJECT_AFTER_DAYS: i64 = 10;

/// Whether the last modification request is older than the grace period.
pub fn modification_request_expired(tender: &Tender, now: DateTime<Utc>) -> bool {
    last_with_action(tender.entries(), actions::MODIFICATION_REQUEST)
        .is_some_and(|entry| entry.timestamp < now - Duration::days(AUTO_REJECT_AFTER_DAYS))
}

#[instrument(skip(deps))]
pub async fn auto_reject_stale_drafts(now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    let pool = &deps.db_pool;
    let budget = PassBudget::from_secs(deps.settings.pass_budget_secs);
    let composer = EmailComposer::new(deps);
    let mut summary = PassSummary::default();

    for tender in Tender::find_awaiting_modification(pool).await? {
        if !modification_request_expired(&tender, now) {
            continue;
        }
        if budget.exhausted() {
            summary.deferred += 1;
            continue;
        }

        let entry = LogEntry::new(actions::AUTO_REJECTED, now)
            .with("after_days", AUTO_REJECT_AFTER_DAYS);
        let Some(rejected) =
            Tender::mark_auto_rejected(tender.id, TenderTransition::AutoReject.sources(), &entry, pool).await?
        else {
            debug!(tender_id = %tender.id, "Draft edited or decided before auto-reject");
            continue;
        };

        let report = deliver_all(deps.email.as_ref(), &[composer.author_rejected(&rejected)]).await;
        summary.processed += 1;
        summary.emails += report.sent;
        info!(tender_id = %rejected.id, "Stale draft auto-rejected");
    }

    Ok(summary)
}
