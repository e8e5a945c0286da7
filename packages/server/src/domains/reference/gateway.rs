//! Read-only queries over reference data consumed by the engine.
//!
//! Everything here is pure-read and safe to call concurrently. Supplier
//! snapshots may be shared for the length of one dispatch pass through
//! [`PassSnapshot`]; they are never kept across passes.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::models::{
    GeoRange, PartnerShareTender, Perimeter, PerimeterKind, PrestaType, Siae, SiaeActivity,
    SiaeKind,
};
use crate::common::utils::Coordinate;
use crate::common::{PerimeterId, SectorId, SiaeActivityId, SiaeId, TenderId, UserId};

/// A perimeter listed by an activity, reduced to what the matcher compares.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneRef {
    pub id: PerimeterId,
    pub kind: PerimeterKind,
    pub insee_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityScope {
    pub id: SiaeActivityId,
    pub sector_ids: Vec<SectorId>,
    pub presta_types: Vec<PrestaType>,
    pub geo_range: GeoRange,
    pub custom_distance_km: Option<f64>,
    pub zones: Vec<ZoneRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierUser {
    pub id: UserId,
    pub email: String,
}

/// A live supplier with its activities pre-joined.
#[derive(Debug, Clone, Serialize)]
pub struct Supplier {
    pub id: SiaeId,
    pub slug: String,
    pub name: String,
    pub kind: SiaeKind,
    pub contact_email: Option<String>,
    pub coordinate: Option<Coordinate>,
    /// Registered users, one per distinct email, oldest first.
    pub users: Vec<SupplierUser>,
    pub has_logo: bool,
    pub has_description: bool,
    pub offer_count: i32,
    pub updated_at: DateTime<Utc>,
    pub activities: Vec<ActivityScope>,
}

impl Supplier {
    pub fn has_users(&self) -> bool {
        !self.users.is_empty()
    }

    /// Contact email if set and non-blank.
    pub fn dispatch_email(&self) -> Option<&str> {
        self.contact_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Users to notify in addition to the contact address.
    pub fn extra_users(&self) -> Vec<&SupplierUser> {
        let contact = self.dispatch_email().map(str::to_lowercase);
        self.users
            .iter()
            .filter(|user| contact.as_deref() != Some(user.email.to_lowercase().as_str()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SupplierSnapshot {
    pub suppliers: Vec<Supplier>,
    pub loaded_at: DateTime<Utc>,
}

impl SupplierSnapshot {
    pub fn get(&self, id: SiaeId) -> Option<&Supplier> {
        self.suppliers.iter().find(|s| s.id == id)
    }

    pub fn by_id(&self) -> HashMap<SiaeId, &Supplier> {
        self.suppliers.iter().map(|s| (s.id, s)).collect()
    }
}

/// Supplier snapshot shared by every tender of one pass, loaded on first use.
#[derive(Default)]
pub struct PassSnapshot {
    suppliers: OnceCell<Arc<SupplierSnapshot>>,
}

impl PassSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn suppliers(&self, pool: &PgPool) -> Result<Arc<SupplierSnapshot>> {
        self.suppliers
            .get_or_try_init(|| async { suppliers_snapshot(pool).await.map(Arc::new) })
            .await
            .cloned()
    }
}

pub async fn resolve_perimeter(slug: &str, pool: &PgPool) -> Result<Option<Perimeter>> {
    Perimeter::find_by_slug(slug, pool).await
}

/// All live suppliers (active, not delisted), each with its activities.
pub async fn suppliers_snapshot(pool: &PgPool) -> Result<SupplierSnapshot> {
    let siaes = Siae::find_live(pool).await?;
    let suppliers = assemble(siaes, pool).await?;
    debug!(count = suppliers.len(), "Loaded supplier snapshot");

    Ok(SupplierSnapshot {
        suppliers,
        loaded_at: Utc::now(),
    })
}

/// Suppliers by id, live or not. Used for author-facing listings.
pub async fn suppliers_by_ids(ids: &[SiaeId], pool: &PgPool) -> Result<Vec<Supplier>> {
    let siaes = Siae::find_by_ids(ids, pool).await?;
    assemble(siaes, pool).await
}

/// Suppliers by id, live ones only. Used for supplier-facing emails.
pub async fn live_suppliers_by_ids(ids: &[SiaeId], pool: &PgPool) -> Result<Vec<Supplier>> {
    let siaes = Siae::find_live_by_ids(ids, pool).await?;
    assemble(siaes, pool).await
}

/// Active partner rosters.
pub async fn partner_rosters(pool: &PgPool) -> Result<Vec<PartnerShareTender>> {
    PartnerShareTender::find_active(pool).await
}

pub async fn is_author_of<'e, E: PgExecutor<'e>>(
    user_id: UserId,
    tender_id: TenderId,
    executor: E,
) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM tenders WHERE id = $1 AND author_id = $2)",
    )
    .bind(tender_id)
    .bind(user_id)
    .fetch_one(executor)
    .await
    .map_err(Into::into)
}

/// Suppliers the user belongs to.
pub async fn siaes_of<'e, E: PgExecutor<'e>>(user_id: UserId, executor: E) -> Result<Vec<SiaeId>> {
    sqlx::query_scalar::<_, SiaeId>(
        "SELECT siae_id FROM siae_users WHERE user_id = $1 ORDER BY siae_id",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(Into::into)
}

#[derive(sqlx::FromRow)]
struct SiaeUserRow {
    siae_id: SiaeId,
    user_id: UserId,
    email: String,
}

async fn assemble(siaes: Vec<Siae>, pool: &PgPool) -> Result<Vec<Supplier>> {
    if siaes.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<SiaeId> = siaes.iter().map(|s| s.id).collect();
    let activities = SiaeActivity::find_for_siaes(&ids, pool).await?;

    let zone_ids: Vec<PerimeterId> = activities
        .iter()
        .flat_map(|a| a.perimeter_ids.iter().copied())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let zones: HashMap<PerimeterId, ZoneRef> = Perimeter::find_by_ids(&zone_ids, pool)
        .await?
        .into_iter()
        .map(|p| {
            (
                p.id,
                ZoneRef {
                    id: p.id,
                    kind: p.kind,
                    insee_code: p.insee_code,
                },
            )
        })
        .collect();

    let user_rows = sqlx::query_as::<_, SiaeUserRow>(
        r#"
        SELECT su.siae_id, su.user_id, u.email
        FROM siae_users su
        INNER JOIN users u ON u.id = su.user_id
        WHERE su.siae_id = ANY($1)
        ORDER BY su.siae_id, u.created_at
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut users: HashMap<SiaeId, Vec<SupplierUser>> = HashMap::new();
    for row in user_rows {
        let list = users.entry(row.siae_id).or_default();
        if !list.iter().any(|u| u.email.eq_ignore_ascii_case(&row.email)) {
            list.push(SupplierUser {
                id: row.user_id,
                email: row.email,
            });
        }
    }

    let mut scopes: HashMap<SiaeId, Vec<ActivityScope>> = HashMap::new();
    for activity in activities {
        scopes.entry(activity.siae_id).or_default().push(ActivityScope {
            id: activity.id,
            sector_ids: activity.sector_ids,
            presta_types: activity.presta_type,
            geo_range: activity.geo_range,
            custom_distance_km: activity.geo_range_custom_distance.map(f64::from),
            zones: activity
                .perimeter_ids
                .iter()
                .filter_map(|id| zones.get(id).cloned())
                .collect(),
        });
    }

    Ok(siaes
        .into_iter()
        .map(|siae| Supplier {
            coordinate: siae.coordinate(),
            users: users.remove(&siae.id).unwrap_or_default(),
            activities: scopes.remove(&siae.id).unwrap_or_default(),
            has_logo: siae.logo_url.as_deref().is_some_and(|s| !s.is_empty()),
            has_description: siae.description.as_deref().is_some_and(|s| !s.trim().is_empty()),
            id: siae.id,
            slug: siae.slug,
            name: siae.name,
            kind: siae.kind,
            contact_email: siae.contact_email,
            offer_count: siae.offer_count,
            updated_at: siae.updated_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier(contact: Option<&str>, emails: &[&str]) -> Supplier {
        Supplier {
            id: SiaeId::new(),
            slug: "atelier".into(),
            name: "Atelier".into(),
            kind: SiaeKind::Ei,
            contact_email: contact.map(String::from),
            coordinate: None,
            users: emails
                .iter()
                .map(|email| SupplierUser {
                    id: UserId::new(),
                    email: email.to_string(),
                })
                .collect(),
            has_logo: false,
            has_description: false,
            offer_count: 0,
            updated_at: Utc::now(),
            activities: vec![],
        }
    }

    #[test]
    fn blank_contact_email_is_not_dispatchable() {
        assert!(supplier(Some("  "), &[]).dispatch_email().is_none());
        assert!(supplier(None, &[]).dispatch_email().is_none());
        assert_eq!(
            supplier(Some("a@siae.fr"), &[]).dispatch_email(),
            Some("a@siae.fr")
        );
    }

    #[test]
    fn extra_users_skip_the_contact_address() {
        let s = supplier(
            Some("contact@siae.fr"),
            &["Contact@siae.fr", "alice@siae.fr", "bob@siae.fr"],
        );
        let emails: Vec<&str> = s.extra_users().iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["alice@siae.fr", "bob@siae.fr"]);
    }
}
