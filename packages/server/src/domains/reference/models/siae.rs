use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::utils::Coordinate;
use crate::common::{PerimeterId, SectorId, SiaeActivityId, SiaeId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "siae_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SiaeKind {
    Ei,
    Ai,
    Aci,
    Etti,
    Eiti,
    Geiq,
    Ea,
    Eatt,
    Esat,
    Sep,
}

/// Kind of service: staff provision, service delivery, or works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "presta_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PrestaType {
    Disp,
    Prest,
    Build,
}

/// Geographic scope of one supplier activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "geo_range", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum GeoRange {
    /// Whole country
    Country,
    /// Listed perimeters
    Zones,
    /// Within `geo_range_custom_distance` km of the supplier
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Siae {
    pub id: SiaeId,
    pub slug: String,
    pub name: String,
    pub kind: SiaeKind,
    pub contact_email: Option<String>,
    pub contact_first_name: Option<String>,
    pub contact_last_name: Option<String>,
    pub contact_phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub post_code: Option<String>,
    pub department_code: Option<String>,
    pub region_code: Option<String>,
    pub logo_url: Option<String>,
    pub description: Option<String>,
    pub offer_count: i32,
    pub is_active: bool,
    pub is_delisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SiaeActivity {
    pub id: SiaeActivityId,
    pub siae_id: SiaeId,
    pub sector_ids: Vec<SectorId>,
    pub presta_type: Vec<PrestaType>,
    pub geo_range: GeoRange,
    pub geo_range_custom_distance: Option<i32>,
    pub perimeter_ids: Vec<PerimeterId>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a supplier.
#[derive(Debug, Clone)]
pub struct NewSiae {
    pub name: String,
    pub kind: SiaeKind,
    pub contact_email: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub department_code: Option<String>,
    pub region_code: Option<String>,
    pub logo_url: Option<String>,
    pub description: Option<String>,
    pub offer_count: i32,
}

impl NewSiae {
    pub fn new(name: &str, kind: SiaeKind, contact_email: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            contact_email: Some(contact_email.to_string()),
            coordinate: None,
            department_code: None,
            region_code: None,
            logo_url: None,
            description: None,
            offer_count: 0,
        }
    }
}

impl Siae {
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(id: SiaeId, executor: E) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM siaes WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_slug(slug: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM siaes WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_ids<'e, E: PgExecutor<'e>>(ids: &[SiaeId], executor: E) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM siaes WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(executor)
            .await
            .map_err(Into::into)
    }

    /// Live suppliers: active and not delisted.
    pub async fn find_live(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM siaes WHERE is_active = true AND is_delisted = false ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_live_by_ids(ids: &[SiaeId], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM siaes WHERE id = ANY($1) AND is_active = true AND is_delisted = false ORDER BY id",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Whether the user is a member of the supplier.
    pub async fn has_user<'e, E: PgExecutor<'e>>(
        siae_id: SiaeId,
        user_id: UserId,
        executor: E,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM siae_users WHERE siae_id = $1 AND user_id = $2)",
        )
        .bind(siae_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn create(new: &NewSiae, pool: &PgPool) -> Result<Self> {
        let slug = crate::common::utils::slugify_with_suffix(&new.name);

        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO siaes (
                id, slug, name, kind, contact_email, latitude, longitude,
                department_code, region_code, logo_url, description, offer_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(SiaeId::new())
        .bind(slug)
        .bind(&new.name)
        .bind(new.kind)
        .bind(&new.contact_email)
        .bind(new.coordinate.map(|c| c.latitude))
        .bind(new.coordinate.map(|c| c.longitude))
        .bind(&new.department_code)
        .bind(&new.region_code)
        .bind(&new.logo_url)
        .bind(&new.description)
        .bind(new.offer_count)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn add_user(siae_id: SiaeId, user_id: UserId, pool: &PgPool) -> Result<()> {
        sqlx::query("INSERT INTO siae_users (siae_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(siae_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

impl SiaeActivity {
    pub async fn find_for_siaes(siae_ids: &[SiaeId], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM siae_activities WHERE siae_id = ANY($1) ORDER BY siae_id, created_at",
        )
        .bind(siae_ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(
        siae_id: SiaeId,
        sector_ids: &[SectorId],
        presta_type: &[PrestaType],
        geo_range: GeoRange,
        geo_range_custom_distance: Option<i32>,
        perimeter_ids: &[PerimeterId],
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO siae_activities (id, siae_id, sector_ids, presta_type, geo_range, geo_range_custom_distance, perimeter_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(SiaeActivityId::new())
        .bind(siae_id)
        .bind(sector_ids)
        .bind(presta_type)
        .bind(geo_range)
        .bind(geo_range_custom_distance)
        .bind(perimeter_ids)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
