use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::dispatch_tender::dispatch_tender;
use crate::common::EngineResult;
use crate::domains::reference::PassSnapshot;
use crate::domains::tenders::models::Tender;
use crate::kernel::{run_tenders, PassBudget, PassSummary, ServerDeps};

/// Dispatch tick: initial pass for VALIDATED tenders, then top-ups for SENT
/// tenders whose batch interval elapsed. One supplier snapshot serves the
/// whole pass.
pub async fn run_dispatch_pass(now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    let pool = &deps.db_pool;
    let interval = Duration::hours(deps.settings.dispatch_batch_interval_hours);

    let mut tender_ids = Tender::ids_awaiting_initial_dispatch(pool).await?;
    tender_ids.extend(Tender::ids_due_for_top_up(now - interval, now.date_naive(), pool).await?);

    if tender_ids.is_empty() {
        return Ok(PassSummary::default());
    }

    let snapshot = PassSnapshot::new();
    let snapshot = &snapshot;
    let summary = run_tenders(
        "dispatch",
        tender_ids,
        deps.settings.worker_concurrency,
        PassBudget::from_secs(deps.settings.pass_budget_secs),
        |tender_id| async move {
            dispatch_tender(tender_id, now, snapshot, deps)
                .await
                .map(|outcome| outcome.report.sent)
        },
    )
    .await;

    info!(
        processed = summary.processed,
        failed = summary.failed,
        deferred = summary.deferred,
        emails = summary.emails,
        "Dispatch pass complete"
    );
    Ok(summary)
}
