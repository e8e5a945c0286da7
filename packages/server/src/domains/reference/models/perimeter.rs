use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::utils::Coordinate;
use crate::common::PerimeterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "perimeter_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PerimeterKind {
    City,
    Department,
    Region,
}

/// A French administrative area: city, department or region.
///
/// `insee_code` is the area's own code. Cities also carry the codes of their
/// department and region; departments carry their region's code.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Perimeter {
    pub id: PerimeterId,
    pub slug: String,
    pub name: String,
    pub kind: PerimeterKind,
    pub insee_code: String,
    pub department_code: Option<String>,
    pub region_code: Option<String>,
    pub post_codes: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Perimeter {
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }

    pub fn is_city(&self) -> bool {
        self.kind == PerimeterKind::City
    }

    /// Region this perimeter belongs to. A region is its own.
    pub fn region(&self) -> Option<&str> {
        match self.kind {
            PerimeterKind::Region => Some(&self.insee_code),
            _ => self.region_code.as_deref(),
        }
    }

    pub async fn find_by_slug(slug: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM perimeters WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        id: PerimeterId,
        executor: E,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM perimeters WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_ids<'e, E: PgExecutor<'e>>(
        ids: &[PerimeterId],
        executor: E,
    ) -> Result<Vec<Self>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Self>("SELECT * FROM perimeters WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn create(perimeter: &Perimeter, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO perimeters (id, slug, name, kind, insee_code, department_code, region_code, post_codes, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(perimeter.id)
        .bind(&perimeter.slug)
        .bind(&perimeter.name)
        .bind(perimeter.kind)
        .bind(&perimeter.insee_code)
        .bind(&perimeter.department_code)
        .bind(&perimeter.region_code)
        .bind(&perimeter.post_codes)
        .bind(perimeter.latitude)
        .bind(perimeter.longitude)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
