//! Supplier interactions with a published tender: viewing it, declaring
//! interest or disinterest, and hiding it from the supplier dashboard.
//!
//! Two entry paths exist. Email deep links carry the edge uuid (and
//! optionally the user id) and need no session. Session users act for the
//! suppliers they belong to, optionally narrowed to one `siae_id`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use super::submission::find_tender;
use crate::common::logs::{actions, LogEntry};
use crate::common::{
    Actor, EngineError, EngineResult, PerimeterId, SectorId, SiaeId, TenderQuestionId, TenderSiaeId,
    UserId,
};
use crate::domains::reference::gateway::{is_author_of, siaes_of};
use crate::domains::reference::Siae;
use crate::domains::tenders::emails::EmailComposer;
use crate::domains::tenders::machines::EdgeStage;
use crate::domains::tenders::models::{
    ContactSnapshot, InterestNotification, QuestionAnswer, ResponseKind, Tender, TenderKind,
    TenderQuestion, TenderSiae, TenderStatus,
};
use crate::domains::tenders::utils::is_tripwire;
use crate::kernel::{deliver_all, EmailEvent, ServerDeps};

/// Public tender page.
#[derive(Debug, Clone, Serialize)]
pub struct TenderView {
    pub slug: String,
    pub kind: TenderKind,
    pub title: String,
    pub description: String,
    pub constraints: Option<String>,
    pub external_link: Option<String>,
    pub deadline_date: NaiveDate,
    pub start_working_date: Option<NaiveDate>,
    pub amount: Option<String>,
    pub response_kind: Vec<ResponseKind>,
    pub status: TenderStatus,
    pub sector_ids: Vec<SectorId>,
    pub perimeter_ids: Vec<PerimeterId>,
    pub location_id: Option<PerimeterId>,
    pub distance_location: Option<i32>,
    pub is_country_area: bool,
    pub questions: Vec<TenderQuestion>,
    /// Only revealed to the author, moderators and interested suppliers.
    pub contact: Option<ContactSnapshot>,
}

impl TenderView {
    fn build(tender: Tender, questions: Vec<TenderQuestion>, reveal_contact: bool) -> Self {
        let amount = tender.amount_display();
        let contact = reveal_contact.then(|| ContactSnapshot {
            first_name: tender.contact_first_name.clone(),
            last_name: tender.contact_last_name.clone(),
            email: tender.contact_email.clone(),
            phone: tender.contact_phone.clone(),
            company_name: tender.contact_company_name.clone(),
        });
        Self {
            slug: tender.slug,
            kind: tender.kind,
            title: tender.title,
            description: tender.description,
            constraints: tender.constraints,
            external_link: tender.external_link,
            deadline_date: tender.deadline_date,
            start_working_date: tender.start_working_date,
            amount,
            response_kind: tender.response_kind,
            status: tender.status,
            sector_ids: tender.sector_ids,
            perimeter_ids: tender.perimeter_ids,
            location_id: tender.location_id,
            distance_location: tender.distance_location,
            is_country_area: tender.is_country_area,
            questions,
            contact,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: TenderQuestionId,
    pub answer: String,
}

/// Who is deciding, and for which supplier edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Edge uuid from an email deep link.
    #[serde(default)]
    pub tender_siae_uuid: Option<TenderSiaeId>,
    /// Narrows a session user's suppliers to one.
    #[serde(default)]
    pub siae_id: Option<SiaeId>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    /// Edges this call moved to the requested decision.
    pub edges: Vec<TenderSiaeId>,
    pub interested_count: i64,
    /// Tripwire counts claimed by this call.
    pub notified_counts: Vec<i64>,
}

#[instrument(skip(deps), fields(actor = ?actor.map(|a| a.user_id)))]
pub async fn view_tender(
    slug: &str,
    tender_siae_uuid: Option<TenderSiaeId>,
    link_user_id: Option<UserId>,
    actor: Option<Actor>,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<TenderView> {
    let pool = &deps.db_pool;
    let tender = find_tender(slug, deps).await?;
    let is_owner = match actor {
        Some(actor) if actor.is_admin => true,
        Some(actor) => is_author_of(actor.user_id, tender.id, pool).await?,
        None => false,
    };

    if tender.status != TenderStatus::Sent && !is_owner {
        return Err(EngineError::not_found("Tender", slug));
    }
    let mut reveal_contact = is_owner;

    if let Some(edge_id) = tender_siae_uuid {
        let edge = find_edge_of(&tender, edge_id, pool).await?;
        let claimed_user = link_user_id.or(actor.map(|a| a.user_id));
        let user_id = member_or_none(edge.siae_id, claimed_user, pool).await?;

        if let Some(updated) = TenderSiae::mark_link_clicked(edge.id, now, user_id, pool).await? {
            reveal_contact |= updated.is_interested();
        }
        debug!(tender_siae_id = %edge.id, "Deep link opened");
    }

    if let Some(actor) = actor.filter(|_| tender.status == TenderStatus::Sent) {
        let siae_ids = siaes_of(actor.user_id, pool).await?;
        if !siae_ids.is_empty() {
            for siae_id in &siae_ids {
                TenderSiae::ensure_link_edge(tender.id, *siae_id, actor.user_id, pool).await?;
            }
            let displayed = TenderSiae::mark_displayed(tender.id, &siae_ids, actor.user_id, now, pool).await?;
            debug!(displayed, "Detail display stamped for supplier members");

            for siae_id in &siae_ids {
                if let Some(edge) = TenderSiae::find(tender.id, *siae_id, pool).await? {
                    reveal_contact |= edge.is_interested();
                }
            }
        }
    }

    let questions = TenderQuestion::find_for_tender(tender.id, pool).await?;
    Ok(TenderView::build(tender, questions, reveal_contact))
}

/// Move the caller's edges to "interested", store question answers and fire
/// author tripwires.
#[instrument(skip(request, deps), fields(actor = ?actor.map(|a| a.user_id)))]
pub async fn declare_interest(
    slug: &str,
    request: DecisionRequest,
    actor: Option<Actor>,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<DecisionOutcome> {
    let pool = &deps.db_pool;
    let tender = find_open_tender(slug, deps).await?;
    let (edges, user_id) = resolve_edges(&tender, &request, actor, pool).await?;

    let questions = TenderQuestion::find_for_tender(tender.id, pool).await?;
    let entry = LogEntry::new(actions::INTERESTED, now);

    let mut tx = pool.begin().await?;
    // Serializes interest counting on the tender.
    let tender = Tender::lock(tender.id, &mut tx)
        .await?
        .ok_or_else(|| EngineError::not_found("Tender", slug))?;
    let before = TenderSiae::count_interested(tender.id, &mut *tx).await?;

    let mut moved = Vec::new();
    let mut conflict = None;
    for edge in &edges {
        match TenderSiae::mark_interested(edge.id, now, user_id, &entry, &mut *tx).await? {
            Some(updated) => {
                for answer in &request.answers {
                    if questions.iter().any(|q| q.id == answer.question_id) {
                        QuestionAnswer::save(answer.question_id, updated.siae_id, &answer.answer, &mut *tx)
                            .await?;
                    } else {
                        warn!(question_id = %answer.question_id, "Answer for a question of another tender ignored");
                    }
                }
                moved.push(updated.id);
            }
            None => {
                conflict = Some(already_decided(edge.id, &mut tx).await?);
            }
        }
    }

    if moved.is_empty() {
        tx.rollback().await?;
        return Err(conflict.unwrap_or_else(|| EngineError::conflict("interest already recorded")));
    }

    let count = TenderSiae::count_interested(tender.id, &mut *tx).await?;
    let mut notified_counts = Vec::new();
    for crossed in (before + 1)..=count {
        if is_tripwire(crossed) && InterestNotification::claim(tender.id, crossed, now, &mut *tx).await? {
            notified_counts.push(crossed);
        }
    }
    if !notified_counts.is_empty() {
        let entry = LogEntry::new(actions::EMAIL_INTERESTED_COUNT, now).with("counts", notified_counts.clone());
        Tender::append_log(tender.id, &entry, &mut *tx).await?;
    }
    tx.commit().await?;

    info!(tender_id = %tender.id, edges = moved.len(), interested = count, "Interest declared");

    if !tender.contact_notifications_disabled && !notified_counts.is_empty() {
        let composer = EmailComposer::new(deps);
        let events: Vec<EmailEvent> = notified_counts
            .iter()
            .map(|c| composer.author_interested_count(&tender, *c))
            .collect();
        deliver_all(deps.email.as_ref(), &events).await;
    }

    Ok(DecisionOutcome {
        edges: moved,
        interested_count: count,
        notified_counts,
    })
}

#[instrument(skip(request, deps), fields(actor = ?actor.map(|a| a.user_id)))]
pub async fn declare_not_interested(
    slug: &str,
    request: DecisionRequest,
    actor: Option<Actor>,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<DecisionOutcome> {
    let pool = &deps.db_pool;
    let tender = find_open_tender(slug, deps).await?;
    let (edges, user_id) = resolve_edges(&tender, &request, actor, pool).await?;

    let feedback = request
        .feedback
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());
    let entry = LogEntry::new(actions::NOT_INTERESTED, now);

    let mut tx = pool.begin().await?;
    let mut moved = Vec::new();
    let mut conflict = None;
    for edge in &edges {
        match TenderSiae::mark_not_interested(edge.id, now, feedback, user_id, &entry, &mut *tx).await? {
            Some(updated) => moved.push(updated.id),
            None => conflict = Some(already_decided(edge.id, &mut tx).await?),
        }
    }

    if moved.is_empty() {
        tx.rollback().await?;
        return Err(conflict.unwrap_or_else(|| EngineError::conflict("decision already recorded")));
    }
    let count = TenderSiae::count_interested(tender.id, &mut *tx).await?;
    tx.commit().await?;

    info!(tender_id = %tender.id, edges = moved.len(), "Not interested declared");
    Ok(DecisionOutcome {
        edges: moved,
        interested_count: count,
        notified_counts: Vec::new(),
    })
}

/// Supplier-side soft hide from the dashboard.
#[instrument(skip(deps), fields(user_id = %actor.user_id))]
pub async fn hide_for_siae(
    slug: &str,
    siae_id: Option<SiaeId>,
    actor: Actor,
    deps: &ServerDeps,
) -> EngineResult<u64> {
    let pool = &deps.db_pool;
    let tender = find_tender(slug, deps).await?;
    let siae_ids = member_siaes(actor.user_id, siae_id, pool).await?;

    let hidden = TenderSiae::hide_for_siae(tender.id, &siae_ids, pool).await?;
    info!(tender_id = %tender.id, hidden, "Tender hidden from supplier dashboard");
    Ok(hidden)
}

async fn find_open_tender(slug: &str, deps: &ServerDeps) -> EngineResult<Tender> {
    let tender = find_tender(slug, deps).await?;
    if tender.status != TenderStatus::Sent {
        return Err(EngineError::not_found("Tender", slug));
    }
    Ok(tender)
}

async fn find_edge_of(tender: &Tender, edge_id: TenderSiaeId, pool: &PgPool) -> EngineResult<TenderSiae> {
    TenderSiae::find_by_id(edge_id, pool)
        .await?
        .filter(|edge| edge.tender_id == tender.id)
        .ok_or_else(|| EngineError::not_found("TenderSiae", edge_id))
}

/// The claimed user, kept only when they belong to the supplier.
async fn member_or_none(siae_id: SiaeId, user_id: Option<UserId>, pool: &PgPool) -> EngineResult<Option<UserId>> {
    match user_id {
        Some(user_id) if Siae::has_user(siae_id, user_id, pool).await? => Ok(Some(user_id)),
        _ => Ok(None),
    }
}

/// Suppliers the user may act for, narrowed to `only` when given.
async fn member_siaes(user_id: UserId, only: Option<SiaeId>, pool: &PgPool) -> EngineResult<Vec<SiaeId>> {
    let siae_ids = siaes_of(user_id, pool).await?;
    if siae_ids.is_empty() {
        return Err(EngineError::forbidden("user does not belong to any supplier"));
    }
    match only {
        Some(siae_id) if siae_ids.contains(&siae_id) => Ok(vec![siae_id]),
        Some(_) => Err(EngineError::forbidden("user does not belong to this supplier")),
        None => Ok(siae_ids),
    }
}

/// Edges a decision applies to, with the user to record on them.
async fn resolve_edges(
    tender: &Tender,
    request: &DecisionRequest,
    actor: Option<Actor>,
    pool: &PgPool,
) -> EngineResult<(Vec<TenderSiae>, Option<UserId>)> {
    if let Some(edge_id) = request.tender_siae_uuid {
        let edge = find_edge_of(tender, edge_id, pool).await?;
        let user_id = member_or_none(edge.siae_id, actor.map(|a| a.user_id), pool).await?;
        return Ok((vec![edge], user_id));
    }

    let actor = crate::common::require_actor(actor)?;
    let siae_ids = member_siaes(actor.user_id, request.siae_id, pool).await?;

    let mut edges = Vec::with_capacity(siae_ids.len());
    for siae_id in siae_ids {
        TenderSiae::ensure_link_edge(tender.id, siae_id, actor.user_id, pool).await?;
        if let Some(edge) = TenderSiae::find(tender.id, siae_id, pool).await? {
            edges.push(edge);
        }
    }
    Ok((edges, Some(actor.user_id)))
}

/// Conflict describing the decision already held by the edge.
async fn already_decided(edge_id: TenderSiaeId, tx: &mut sqlx::PgConnection) -> EngineResult<EngineError> {
    let edge = TenderSiae::find_by_id(edge_id, &mut *tx)
        .await?
        .ok_or_else(|| EngineError::not_found("TenderSiae", edge_id))?;
    let stage = EdgeStage::of(&edge);
    if !stage.is_terminal() {
        warn!(tender_siae_id = %edge_id, ?stage, "Decision matched no row on an undecided edge");
        return Ok(EngineError::conflict("decision could not be recorded"));
    }
    let message = match stage {
        EdgeStage::Interested => "supplier already declared interest",
        _ => "supplier already declared not interested",
    };
    warn!(tender_siae_id = %edge_id, "{}", message);
    Ok(EngineError::conflict(message))
}
