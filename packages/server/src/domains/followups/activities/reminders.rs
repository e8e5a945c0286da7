//! Supplier reminders: no click N days after the presentation email, and a
//! follow-up two days after declaring interest.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

use crate::common::logs::{actions, LogEntry};
use crate::common::{EngineError, EngineResult, SiaeId, TenderId};
use crate::domains::followups::windows::reminder_window;
use crate::domains::reference::{gateway, Supplier};
use crate::domains::tenders::emails::EmailComposer;
use crate::domains::tenders::models::{Tender, TenderSiae};
use crate::kernel::{deliver_all, run_tenders, EmailEvent, EmailKind, PassBudget, PassSummary, ServerDeps};

/// Reminder email and idempotency log action for a click reminder after
/// `days` days.
fn click_reminder(days: i64) -> EngineResult<(EmailKind, &'static str)> {
    match days {
        2 => Ok((EmailKind::SupplierReminder2d, actions::EMAIL_REMINDER_2D)),
        3 => Ok((EmailKind::SupplierReminder3d, actions::EMAIL_REMINDER_3D)),
        4 => Ok((EmailKind::SupplierReminder4d, actions::EMAIL_REMINDER_4D)),
        _ => Err(EngineError::validation(format!("no click reminder after {} days", days))),
    }
}

#[instrument(skip(deps))]
pub async fn send_click_reminders(days: i64, now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    let (kind, action) = click_reminder(days)?;
    let (from, until) = reminder_window(now, days);
    let edges = TenderSiae::find_click_reminder_due(from, until, action, &deps.db_pool).await?;
    remind_edges("click_reminder", edges, kind, action, now, deps).await
}

#[instrument(skip(deps))]
pub async fn send_interest_reminders(now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
    let action = actions::EMAIL_INTERESTED_REMINDER_2D;
    let (from, until) = reminder_window(now, 2);
    let edges = TenderSiae::find_interest_reminder_due(from, until, action, &deps.db_pool).await?;
    remind_edges(
        "interest_reminder",
        edges,
        EmailKind::InterestedSupplierReminder2d,
        action,
        now,
        deps,
    )
    .await
}

/// Log the reminder on each edge, then email the suppliers whose log entry
/// this pass wrote.
async fn remind_edges(
    job: &'static str,
    edges: Vec<TenderSiae>,
    kind: EmailKind,
    action: &'static str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<PassSummary> {
    if edges.is_empty() {
        debug!(job, "No reminder due");
        return Ok(PassSummary::default());
    }

    let siae_ids: Vec<SiaeId> = edges.iter().map(|e| e.siae_id).collect();
    let suppliers: HashMap<SiaeId, Supplier> = gateway::live_suppliers_by_ids(&siae_ids, &deps.db_pool)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let mut by_tender: BTreeMap<TenderId, Vec<TenderSiae>> = BTreeMap::new();
    for edge in edges {
        by_tender.entry(edge.tender_id).or_default().push(edge);
    }
    let tender_ids: Vec<TenderId> = by_tender.keys().copied().collect();

    let suppliers = &suppliers;
    let by_tender = &by_tender;
    let summary = run_tenders(
        job,
        tender_ids,
        deps.settings.worker_concurrency,
        PassBudget::from_secs(deps.settings.pass_budget_secs),
        move |tender_id| remind_tender(tender_id, &by_tender[&tender_id], suppliers, kind, action, now, deps),
    )
    .await;

    info!(
        job,
        kind = kind.as_str(),
        processed = summary.processed,
        failed = summary.failed,
        emails = summary.emails,
        "Reminders sent"
    );
    Ok(summary)
}

async fn remind_tender(
    tender_id: TenderId,
    edges: &[TenderSiae],
    suppliers: &HashMap<SiaeId, Supplier>,
    kind: EmailKind,
    action: &'static str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<usize> {
    let tender = Tender::find_by_id(tender_id, &deps.db_pool)
        .await?
        .ok_or_else(|| EngineError::not_found("Tender", tender_id))?;
    let composer = EmailComposer::new(deps);
    let entry = LogEntry::new(action, now);

    let mut events: Vec<EmailEvent> = Vec::new();
    for edge in edges {
        let Some(supplier) = suppliers.get(&edge.siae_id) else {
            debug!(siae_id = %edge.siae_id, "Supplier inactive or delisted, reminder skipped");
            continue;
        };
        if TenderSiae::append_log_once(edge.id, &entry, &deps.db_pool).await? {
            events.extend(composer.supplier_reminder(kind, &tender, edge.id, supplier));
        }
    }

    Ok(deliver_all(deps.email.as_ref(), &events).await.sent)
}
