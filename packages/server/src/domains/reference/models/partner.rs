use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{PartnerShareTenderId, PerimeterId};

/// Coarse amount bands, declared in ascending order so `Ord` follows the
/// amounts they stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tender_amount")]
pub enum TenderAmount {
    #[sqlx(rename = "0-1K")]
    #[serde(rename = "0-1K")]
    UpTo1K,
    #[sqlx(rename = "1-5K")]
    #[serde(rename = "1-5K")]
    From1KTo5K,
    #[sqlx(rename = "5-10K")]
    #[serde(rename = "5-10K")]
    From5KTo10K,
    #[sqlx(rename = "10-15K")]
    #[serde(rename = "10-15K")]
    From10KTo15K,
    #[sqlx(rename = "15-20K")]
    #[serde(rename = "15-20K")]
    From15KTo20K,
    #[sqlx(rename = "20-30K")]
    #[serde(rename = "20-30K")]
    From20KTo30K,
    #[sqlx(rename = "30-50K")]
    #[serde(rename = "30-50K")]
    From30KTo50K,
    #[sqlx(rename = "50-100K")]
    #[serde(rename = "50-100K")]
    From50KTo100K,
    #[sqlx(rename = "100-150K")]
    #[serde(rename = "100-150K")]
    From100KTo150K,
    #[sqlx(rename = "150-250K")]
    #[serde(rename = "150-250K")]
    From150KTo250K,
    #[sqlx(rename = "250-500K")]
    #[serde(rename = "250-500K")]
    From250KTo500K,
    #[sqlx(rename = "500-750K")]
    #[serde(rename = "500-750K")]
    From500KTo750K,
    #[sqlx(rename = "750K-1M")]
    #[serde(rename = "750K-1M")]
    From750KTo1M,
    #[sqlx(rename = ">1M")]
    #[serde(rename = ">1M")]
    Over1M,
}

impl TenderAmount {
    /// Band containing an exact amount in euros.
    pub fn from_exact(amount: i64) -> Self {
        match amount {
            i64::MIN..=999 => Self::UpTo1K,
            1_000..=4_999 => Self::From1KTo5K,
            5_000..=9_999 => Self::From5KTo10K,
            10_000..=14_999 => Self::From10KTo15K,
            15_000..=19_999 => Self::From15KTo20K,
            20_000..=29_999 => Self::From20KTo30K,
            30_000..=49_999 => Self::From30KTo50K,
            50_000..=99_999 => Self::From50KTo100K,
            100_000..=149_999 => Self::From100KTo150K,
            150_000..=249_999 => Self::From150KTo250K,
            250_000..=499_999 => Self::From250KTo500K,
            500_000..=749_999 => Self::From500KTo750K,
            750_000..=999_999 => Self::From750KTo1M,
            _ => Self::Over1M,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UpTo1K => "0-1 K€",
            Self::From1KTo5K => "1-5 K€",
            Self::From5KTo10K => "5-10 K€",
            Self::From10KTo15K => "10-15 K€",
            Self::From15KTo20K => "15-20 K€",
            Self::From20KTo30K => "20-30 K€",
            Self::From30KTo50K => "30-50 K€",
            Self::From50KTo100K => "50-100 K€",
            Self::From100KTo150K => "100-150 K€",
            Self::From150KTo250K => "150-250 K€",
            Self::From250KTo500K => "250-500 K€",
            Self::From500KTo750K => "500-750 K€",
            Self::From750KTo1M => "750 K€-1 M€",
            Self::Over1M => "> 1 M€",
        }
    }
}

/// A partner broadcast list. Receives one email per tender.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PartnerShareTender {
    pub id: PartnerShareTenderId,
    pub name: String,
    /// Empty means any perimeter.
    pub perimeter_ids: Vec<PerimeterId>,
    pub amount_in: Option<TenderAmount>,
    pub is_active: bool,
    pub contact_email_list: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PartnerShareTender {
    pub async fn find_active(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM partner_share_tenders WHERE is_active = true ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(
        name: &str,
        perimeter_ids: &[PerimeterId],
        amount_in: Option<TenderAmount>,
        contact_email_list: &[String],
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO partner_share_tenders (id, name, perimeter_ids, amount_in, contact_email_list)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(PartnerShareTenderId::new())
        .bind(name)
        .bind(perimeter_ids)
        .bind(amount_in)
        .bind(contact_email_list)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_order_by_amount() {
        assert!(TenderAmount::UpTo1K < TenderAmount::From1KTo5K);
        assert!(TenderAmount::From50KTo100K < TenderAmount::From100KTo150K);
        assert!(TenderAmount::From750KTo1M < TenderAmount::Over1M);
    }

    #[test]
    fn exact_amount_falls_in_its_band() {
        assert_eq!(TenderAmount::from_exact(0), TenderAmount::UpTo1K);
        assert_eq!(TenderAmount::from_exact(1_000), TenderAmount::From1KTo5K);
        assert_eq!(TenderAmount::from_exact(42_000), TenderAmount::From30KTo50K);
        assert_eq!(TenderAmount::from_exact(999_999), TenderAmount::From750KTo1M);
        assert_eq!(TenderAmount::from_exact(5_000_000), TenderAmount::Over1M);
    }

    #[test]
    fn band_serializes_as_stored_label() {
        let json = serde_json::to_value(TenderAmount::From750KTo1M).unwrap();
        assert_eq!(json, "750K-1M");
        let back: TenderAmount = serde_json::from_value(serde_json::json!(">1M")).unwrap();
        assert_eq!(back, TenderAmount::Over1M);
    }
}
