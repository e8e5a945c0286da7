use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::SectorId;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sector {
    pub id: SectorId,
    pub slug: String,
    pub name: String,
    pub group_name: Option<String>,
}

impl Sector {
    pub async fn find_by_ids(ids: &[SectorId], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM sectors WHERE id = ANY($1) ORDER BY name")
            .bind(ids)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn create(slug: &str, name: &str, group_name: Option<&str>, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO sectors (id, slug, name, group_name) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(SectorId::new())
        .bind(slug)
        .bind(name)
        .bind(group_name)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
