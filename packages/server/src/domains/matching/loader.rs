//! Resolves what the pure matchers need from the database.

use anyhow::Result;
use sqlx::PgPool;
use std::collections::HashMap;

use super::utils::{filter_partners, Targeting};
use crate::common::PerimeterId;
use crate::domains::reference::{gateway, PartnerShareTender, Perimeter};
use crate::domains::tenders::models::Tender;

/// Resolve the tender's perimeters and location.
pub async fn load_targeting(tender: &Tender, pool: &PgPool) -> Result<Targeting> {
    let perimeters = Perimeter::find_by_ids(&tender.perimeter_ids, pool).await?;
    let location = match tender.location_id {
        Some(id) => Perimeter::find_by_id(id, pool).await?,
        None => None,
    };
    Ok(Targeting::for_tender(tender, perimeters, location))
}

/// Active rosters the tender should be broadcast to.
pub async fn matching_partners(tender: &Tender, targeting: &Targeting, pool: &PgPool) -> Result<Vec<PartnerShareTender>> {
    let rosters = gateway::partner_rosters(pool).await?;

    let roster_perimeter_ids: Vec<PerimeterId> = rosters
        .iter()
        .flat_map(|r| r.perimeter_ids.iter().copied())
        .collect();
    let known: HashMap<PerimeterId, Perimeter> = Perimeter::find_by_ids(&roster_perimeter_ids, pool)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut tender_perimeters = targeting.perimeters.clone();
    if let Some(location) = &targeting.location {
        if !tender_perimeters.iter().any(|p| p.id == location.id) {
            tender_perimeters.push(location.clone());
        }
    }

    Ok(filter_partners(&rosters, &tender_perimeters, tender.amount_band(), &known)
        .into_iter()
        .cloned()
        .collect())
}
