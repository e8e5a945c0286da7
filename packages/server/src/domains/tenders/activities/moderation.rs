//! Moderator decisions on submitted tenders.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use super::submission::find_tender;
use crate::common::logs::{actions, LogEntry};
use crate::common::{Actor, EngineError, EngineResult};
use crate::domains::dispatch::{dispatch_tender, DispatchOutcome};
use crate::domains::reference::PassSnapshot;
use crate::domains::tenders::emails::EmailComposer;
use crate::domains::tenders::machines::TenderTransition;
use crate::domains::tenders::models::Tender;
use crate::kernel::{deliver_all, ServerDeps};

/// Validate a submitted tender and run its first dispatch right away.
#[instrument(skip(deps), fields(moderator = %actor.user_id))]
pub async fn validate_tender(
    actor: Actor,
    slug: &str,
    partners_only: bool,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<(Tender, DispatchOutcome)> {
    actor.require_admin()?;
    let tender = find_tender(slug, deps).await?;

    if !TenderTransition::Validate.allowed_from(tender.status) {
        return Err(EngineError::validation(format!(
            "cannot validate a tender in status {:?}",
            tender.status
        )));
    }
    if tender.sector_ids.is_empty() {
        return Err(EngineError::validation("at least one sector is required before validation"));
    }

    let validated = Tender::mark_validated(tender.id, now, partners_only, actor.user_id, &deps.db_pool)
        .await?
        .ok_or_else(|| EngineError::conflict("tender changed status during validation"))?;
    info!(tender_id = %validated.id, partners_only, "Tender validated");

    let outcome = dispatch_tender(validated.id, now, &PassSnapshot::new(), deps).await?;
    let tender = Tender::find_by_id(validated.id, &deps.db_pool)
        .await?
        .unwrap_or(validated);

    Ok((tender, outcome))
}

/// Send a submitted tender back to its author with a message.
#[instrument(skip(message, deps), fields(moderator = %actor.user_id))]
pub async fn request_modification(
    actor: Actor,
    slug: &str,
    message: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<Tender> {
    actor.require_admin()?;
    let tender = find_tender(slug, deps).await?;

    if !TenderTransition::RequestModification.allowed_from(tender.status) {
        return Err(EngineError::validation("only submitted tenders can be sent back for changes"));
    }
    if message.trim().is_empty() {
        return Err(EngineError::validation("a message for the author is required"));
    }

    let updated = Tender::mark_modification_requested(tender.id, now, message, &deps.db_pool)
        .await?
        .ok_or_else(|| EngineError::conflict("tender changed status during moderation"))?;

    let event = EmailComposer::new(deps).author_modification_request(&updated, message);
    deliver_all(deps.email.as_ref(), &[event]).await;

    info!(tender_id = %updated.id, "Modification requested");
    Ok(updated)
}

#[instrument(skip(deps), fields(moderator = %actor.user_id))]
pub async fn reject_tender(
    actor: Actor,
    slug: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<Tender> {
    actor.require_admin()?;
    let tender = find_tender(slug, deps).await?;

    if !TenderTransition::Reject.allowed_from(tender.status) {
        return Err(EngineError::conflict("tender already rejected"));
    }

    let entry = LogEntry::new(actions::REJECTED, now).with("user_id", actor.user_id.to_string());
    let rejected = Tender::mark_rejected(tender.id, TenderTransition::Reject.sources(), &entry, &deps.db_pool)
        .await?
        .ok_or_else(|| EngineError::conflict("tender already rejected"))?;

    let event = EmailComposer::new(deps).author_rejected(&rejected);
    deliver_all(deps.email.as_ref(), &[event]).await;

    info!(tender_id = %rejected.id, "Tender rejected");
    Ok(rejected)
}
