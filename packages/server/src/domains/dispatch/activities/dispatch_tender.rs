//! One dispatch pass over one tender.
//!
//! Inside a single transaction holding the tender row: attach MATCHING edges,
//! pick the next batch, stamp `email_send_date`, append logs and move the
//! tender to SENT. Emails go out only after commit, suppliers first, then
//! partners, then the author. A pass that cannot lock the tender returns
//! `Busy` without touching anything.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use crate::common::logs::{actions, LogEntry};
use crate::common::{EngineError, EngineResult, SiaeId, TenderId};
use crate::domains::matching::{load_targeting, match_suppliers, matching_partners};
use crate::domains::reference::PassSnapshot;
use crate::domains::tenders::emails::EmailComposer;
use crate::domains::tenders::models::{Tender, TenderSiae, TenderStatus};
use crate::kernel::{deliver_all, DeliveryReport, EmailEvent, ServerDeps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// First pass after validation.
    Initial,
    /// Another batch on an already SENT tender.
    TopUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Dispatched(DispatchMode),
    /// Another pass holds the tender.
    Busy,
    /// Tender not eligible any more; nothing written.
    Skipped(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    pub matched: usize,
    pub stamped_edges: usize,
    pub partners: usize,
    pub report: DeliveryReport,
}

impl DispatchOutcome {
    fn nothing(status: DispatchStatus) -> Self {
        Self {
            status,
            matched: 0,
            stamped_edges: 0,
            partners: 0,
            report: DeliveryReport::default(),
        }
    }
}

#[instrument(skip(snapshot, deps), fields(tender_id = %tender_id))]
pub async fn dispatch_tender(
    tender_id: TenderId,
    now: DateTime<Utc>,
    snapshot: &PassSnapshot,
    deps: &ServerDeps,
) -> EngineResult<DispatchOutcome> {
    let pool = &deps.db_pool;
    let mut tx = pool.begin().await?;

    let Some(tender) = Tender::lock_for_pass(tender_id, &mut tx).await? else {
        drop(tx);
        return match Tender::find_by_id(tender_id, pool).await? {
            Some(_) => {
                warn!("Tender locked by another pass, skipping");
                Ok(DispatchOutcome::nothing(DispatchStatus::Busy))
            }
            None => Err(EngineError::not_found("Tender", tender_id)),
        };
    };

    let mode = match tender.status {
        TenderStatus::Validated => DispatchMode::Initial,
        TenderStatus::Sent => {
            if let Some(reason) = top_up_blocker(&tender, now, deps, &mut tx).await? {
                debug!(reason, "Top-up not due");
                return Ok(DispatchOutcome::nothing(DispatchStatus::Skipped(reason)));
            }
            DispatchMode::TopUp
        }
        _ => return Ok(DispatchOutcome::nothing(DispatchStatus::Skipped("status"))),
    };

    // Supplier batch
    let targeting = load_targeting(&tender, pool).await?;
    let suppliers = snapshot.suppliers(pool).await?;

    let (matched, stamped) = if tender.send_to_commercial_partners_only {
        (Vec::new(), Vec::new())
    } else {
        let matched: Vec<SiaeId> = match_suppliers(&targeting, &suppliers)
            .into_iter()
            .filter(|s| s.dispatch_email().is_some())
            .map(|s| s.id)
            .collect();

        TenderSiae::insert_matched(tender.id, &matched, &mut tx).await?;

        let rank: HashMap<SiaeId, usize> = matched.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut candidates: Vec<TenderSiae> = TenderSiae::find_unsent(tender.id, &mut *tx)
            .await?
            .into_iter()
            .filter(|edge| rank.contains_key(&edge.siae_id))
            .collect();
        candidates.sort_by_key(|edge| rank[&edge.siae_id]);
        candidates.truncate(tender.limit_send_to_siae_batch.max(0) as usize);

        let ids: Vec<_> = candidates.iter().map(|edge| edge.id).collect();
        let stamped = if ids.is_empty() {
            Vec::new()
        } else {
            let entry = LogEntry::new(actions::EMAIL_SIAES_MATCHED, now);
            let mut stamped = TenderSiae::stamp_email_sent(&ids, now, &entry, &mut tx).await?;
            stamped.sort_by_key(|edge| rank[&edge.siae_id]);
            stamped
        };
        (matched, stamped)
    };

    // Partner broadcast happens once, on the initial pass.
    let partners = match mode {
        DispatchMode::Initial => matching_partners(&tender, &targeting, pool).await?,
        DispatchMode::TopUp => Vec::new(),
    };

    // Compose before commit so logs can record what goes out.
    let composer = EmailComposer::new(deps);
    let by_id = suppliers.by_id();
    let mut supplier_events: Vec<EmailEvent> = Vec::new();
    let mut user_events = 0;
    for edge in &stamped {
        match by_id.get(&edge.siae_id) {
            Some(supplier) => {
                user_events += supplier.extra_users().len();
                supplier_events.extend(composer.supplier_presentation(&tender, edge.id, supplier));
            }
            None => warn!(siae_id = %edge.siae_id, "Stamped supplier missing from snapshot"),
        }
    }
    let partner_events: Vec<EmailEvent> = partners
        .iter()
        .filter_map(|roster| composer.partner_presentation(&tender, roster))
        .collect();
    let author_event = (mode == DispatchMode::Initial && !tender.contact_notifications_disabled)
        .then(|| composer.author_confirmation(&tender, stamped.len(), partner_events.len()));

    let subject = format!("{} : {}", tender.kind.label(), tender.title);
    if !stamped.is_empty() || mode == DispatchMode::Initial {
        let entry = LogEntry::new(actions::EMAIL_SIAES_MATCHED, now)
            .with("subject", subject.as_str())
            .with("count", stamped.len())
            .with("initial", mode == DispatchMode::Initial);
        Tender::append_log(tender.id, &entry, &mut *tx).await?;

        let entry = LogEntry::new(actions::EMAIL_SIAE_USERS_MATCHED, now).with("count", user_events);
        Tender::append_log(tender.id, &entry, &mut *tx).await?;
    }
    if mode == DispatchMode::Initial {
        let entry = LogEntry::new(actions::EMAIL_PARTNERS_MATCHED, now).with("count", partner_events.len());
        Tender::append_log(tender.id, &entry, &mut *tx).await?;
    }
    if author_event.is_some() {
        let entry = LogEntry::new(actions::EMAIL_AUTHOR_CONFIRMATION, now);
        Tender::append_log(tender.id, &entry, &mut *tx).await?;
    }

    Tender::mark_sent(tender.id, now, &mut *tx).await?;
    tx.commit().await?;

    info!(
        mode = ?mode,
        matched = matched.len(),
        stamped = stamped.len(),
        partners = partner_events.len(),
        "Tender dispatched"
    );

    let mut report = deliver_all(deps.email.as_ref(), &supplier_events).await;
    report.merge(deliver_all(deps.email.as_ref(), &partner_events).await);
    if let Some(event) = author_event {
        report.merge(deliver_all(deps.email.as_ref(), &[event]).await);
    }

    Ok(DispatchOutcome {
        status: DispatchStatus::Dispatched(mode),
        matched: matched.len(),
        stamped_edges: stamped.len(),
        partners: partner_events.len(),
        report,
    })
}

/// Why a SENT tender should not get another batch now, if any.
async fn top_up_blocker(
    tender: &Tender,
    now: DateTime<Utc>,
    deps: &ServerDeps,
    conn: &mut sqlx::PgConnection,
) -> EngineResult<Option<&'static str>> {
    if tender.send_to_commercial_partners_only {
        return Ok(Some("partners_only"));
    }
    if tender.deadline_date < now.date_naive() {
        return Ok(Some("deadline_passed"));
    }
    let interval = Duration::hours(deps.settings.dispatch_batch_interval_hours);
    if tender.last_sent_at.is_some_and(|last| last > now - interval) {
        return Ok(Some("interval"));
    }
    let interested = TenderSiae::count_interested(tender.id, &mut *conn).await?;
    if interested >= i64::from(tender.limit_nb_siae_interested) {
        return Ok(Some("interest_cap"));
    }
    Ok(None)
}
