//! Author and moderator views over a tender's suppliers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::instrument;

use super::submission::{ensure_author_or_admin, find_tender};
use crate::common::{Actor, EngineResult, SiaeId, TenderQuestionId, TenderSiaeId};
use crate::domains::reference::gateway::is_author_of;
use crate::domains::reference::Siae;
use crate::domains::tenders::models::{QuestionAnswer, Tender, TenderSiae, TenderStats};
use crate::kernel::ServerDeps;

#[instrument(skip(deps), fields(user_id = %actor.user_id))]
pub async fn tender_stats(actor: Actor, slug: &str, deps: &ServerDeps) -> EngineResult<TenderStats> {
    let tender = find_tender(slug, deps).await?;
    ensure_author_or_admin(&actor, &tender, &deps.db_pool).await?;
    Ok(TenderSiae::stats(tender.id, &deps.db_pool).await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct InterestedSupplier {
    pub tender_siae_id: TenderSiaeId,
    pub siae_id: SiaeId,
    pub name: String,
    pub slug: String,
    pub contact_email: Option<String>,
    pub interested_at: Option<DateTime<Utc>>,
    pub answers: Vec<(TenderQuestionId, String)>,
}

/// Interested suppliers with their question answers. Opening the list as the
/// author records `siae_list_last_seen_date`.
#[instrument(skip(deps), fields(user_id = %actor.user_id))]
pub async fn interested_suppliers(
    actor: Actor,
    slug: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<Vec<InterestedSupplier>> {
    let pool = &deps.db_pool;
    let tender = find_tender(slug, deps).await?;
    ensure_author_or_admin(&actor, &tender, pool).await?;

    let edges = TenderSiae::find_interested(tender.id, pool).await?;
    let siae_ids: Vec<SiaeId> = edges.iter().map(|e| e.siae_id).collect();
    let siaes: HashMap<SiaeId, Siae> = Siae::find_by_ids(&siae_ids, pool)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let mut answers: HashMap<SiaeId, Vec<(TenderQuestionId, String)>> = HashMap::new();
    for answer in QuestionAnswer::find_for_tender(tender.id, pool).await? {
        answers
            .entry(answer.siae_id)
            .or_default()
            .push((answer.question_id, answer.answer));
    }

    if is_author_of(actor.user_id, tender.id, pool).await? {
        Tender::touch_siae_list_seen(tender.id, now, pool).await?;
    }

    Ok(edges
        .into_iter()
        .filter_map(|edge| {
            let siae = siaes.get(&edge.siae_id)?;
            Some(InterestedSupplier {
                tender_siae_id: edge.id,
                siae_id: siae.id,
                name: siae.name.clone(),
                slug: siae.slug.clone(),
                contact_email: siae.contact_email.clone(),
                interested_at: edge.detail_contact_click_date,
                answers: answers.remove(&siae.id).unwrap_or_default(),
            })
        })
        .collect())
}
