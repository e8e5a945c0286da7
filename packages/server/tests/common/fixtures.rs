//! Test fixtures for creating test data.
//!
//! Reference data goes through the model methods directly. Tenders go
//! through the engine activities so they carry realistic logs and stamps.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::PgPool;

use tender_core::common::utils::Coordinate;
use tender_core::common::{Actor, PerimeterId, SectorId, TenderSiaeId};
use tender_core::domains::reference::{
    GeoRange, NewSiae, Perimeter, PerimeterKind, PrestaType, Sector, Siae, SiaeActivity, SiaeKind,
    User,
};
use tender_core::domains::tenders::activities::{create_tender, validate_tender};
use tender_core::domains::tenders::models::{
    ResponseKind, Tender, TenderInput, TenderKind, TenderSiae, TenderSource,
};
use tender_core::kernel::ServerDeps;

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Geography
// ============================================================================

/// Grenoble and its department and region, plus Paris and its region.
pub struct Geo {
    pub grenoble: Perimeter,
    pub isere: Perimeter,
    pub aura: Perimeter,
    pub paris: Perimeter,
    pub idf: Perimeter,
}

pub const GRENOBLE: (f64, f64) = (45.1885, 5.7245);
/// About 22 km from Grenoble.
pub const VOIRON: (f64, f64) = (45.3640, 5.5890);
pub const PARIS: (f64, f64) = (48.8566, 2.3522);

async fn create_perimeter(
    pool: &PgPool,
    name: &str,
    kind: PerimeterKind,
    insee_code: &str,
    department_code: Option<&str>,
    region_code: Option<&str>,
    coordinate: Option<(f64, f64)>,
) -> Result<Perimeter> {
    let perimeter = Perimeter {
        id: PerimeterId::new(),
        slug: format!("{}-{}", name.to_lowercase(), insee_code),
        name: name.to_string(),
        kind,
        insee_code: insee_code.to_string(),
        department_code: department_code.map(String::from),
        region_code: region_code.map(String::from),
        post_codes: vec![],
        latitude: coordinate.map(|c| c.0),
        longitude: coordinate.map(|c| c.1),
    };
    Perimeter::create(&perimeter, pool).await
}

pub async fn seed_geo(pool: &PgPool) -> Result<Geo> {
    Ok(Geo {
        grenoble: create_perimeter(pool, "Grenoble", PerimeterKind::City, "38185", Some("38"), Some("84"), Some(GRENOBLE)).await?,
        isere: create_perimeter(pool, "Isere", PerimeterKind::Department, "38", None, Some("84"), None).await?,
        aura: create_perimeter(pool, "Auvergne-Rhone-Alpes", PerimeterKind::Region, "84", None, None, None).await?,
        paris: create_perimeter(pool, "Paris", PerimeterKind::City, "75056", Some("75"), Some("11"), Some(PARIS)).await?,
        idf: create_perimeter(pool, "Ile-de-France", PerimeterKind::Region, "11", None, None, None).await?,
    })
}

// ============================================================================
// People and suppliers
// ============================================================================

pub async fn create_user(pool: &PgPool, email: &str) -> Result<User> {
    User::create(email, "Camille", "Martin", false, pool).await
}

/// A buyer, as the actor that authors tenders.
pub async fn create_buyer(pool: &PgPool, email: &str) -> Result<Actor> {
    let user = create_user(pool, email).await?;
    Ok(Actor::user(user.id))
}

pub async fn create_admin(pool: &PgPool) -> Result<Actor> {
    let user = User::create("moderation@lemarche.test", "Alex", "Durand", true, pool).await?;
    Ok(Actor::admin(user.id))
}

pub async fn create_sector(pool: &PgPool, slug: &str) -> Result<Sector> {
    Sector::create(slug, slug, None, pool).await
}

/// One activity of a supplier.
pub struct ActivitySpec<'a> {
    pub sectors: Vec<SectorId>,
    pub geo_range: GeoRange,
    pub custom_distance: Option<i32>,
    pub zones: Vec<&'a Perimeter>,
}

impl<'a> ActivitySpec<'a> {
    pub fn country(sectors: &[SectorId]) -> Self {
        Self {
            sectors: sectors.to_vec(),
            geo_range: GeoRange::Country,
            custom_distance: None,
            zones: vec![],
        }
    }

    pub fn zones(sectors: &[SectorId], zones: &[&'a Perimeter]) -> Self {
        Self {
            sectors: sectors.to_vec(),
            geo_range: GeoRange::Zones,
            custom_distance: None,
            zones: zones.to_vec(),
        }
    }

    pub fn custom(sectors: &[SectorId], km: i32) -> Self {
        Self {
            sectors: sectors.to_vec(),
            geo_range: GeoRange::Custom,
            custom_distance: Some(km),
            zones: vec![],
        }
    }
}

/// Supplier with a contact email derived from its name and the given activity.
pub async fn create_supplier(
    pool: &PgPool,
    name: &str,
    coordinate: Option<(f64, f64)>,
    activity: ActivitySpec<'_>,
) -> Result<Siae> {
    let mut new = NewSiae::new(name, SiaeKind::Ei, &supplier_email(name));
    new.coordinate = coordinate.map(|(lat, lng)| Coordinate::new(lat, lng));
    let siae = Siae::create(&new, pool).await?;

    let zone_ids: Vec<PerimeterId> = activity.zones.iter().map(|p| p.id).collect();
    SiaeActivity::create(
        siae.id,
        &activity.sectors,
        &[PrestaType::Prest],
        activity.geo_range,
        activity.custom_distance,
        &zone_ids,
        pool,
    )
    .await?;

    Ok(siae)
}

pub fn supplier_email(name: &str) -> String {
    format!("contact@{}.test", name.to_lowercase().replace(' ', "-"))
}

/// Registers a user as a member of the supplier.
pub async fn add_member(pool: &PgPool, siae: &Siae, email: &str) -> Result<User> {
    let user = create_user(pool, email).await?;
    Siae::add_user(siae.id, user.id, pool).await?;
    Ok(user)
}

// ============================================================================
// Tenders
// ============================================================================

/// A quote request answered by email, open until the end of April 2024.
pub fn tender_input(title: &str, sectors: &[SectorId]) -> TenderInput {
    TenderInput::builder()
        .kind(TenderKind::Quote)
        .title(title)
        .description("Prestation récurrente pour nos sites")
        .deadline_date(date(2024, 4, 30))
        .response_kind(vec![ResponseKind::Email])
        .sector_ids(sectors.to_vec())
        .build()
}

/// Submitted by `author` at `now`.
pub async fn submit(deps: &ServerDeps, author: Actor, input: TenderInput, now: DateTime<Utc>) -> Result<Tender> {
    Ok(create_tender(author, input, TenderSource::Form, true, now, deps).await?)
}

/// Submitted, validated and dispatched at `now`.
pub async fn publish(
    deps: &ServerDeps,
    author: Actor,
    admin: Actor,
    input: TenderInput,
    now: DateTime<Utc>,
) -> Result<Tender> {
    let tender = submit(deps, author, input, now).await?;
    let (tender, _) = validate_tender(admin, &tender.slug, false, now, deps).await?;
    Ok(tender)
}

pub async fn edge_of(pool: &PgPool, tender: &Tender, siae: &Siae) -> Result<TenderSiae> {
    TenderSiae::find(tender.id, siae.id, pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no edge for {} on {}", siae.name, tender.slug))
}

pub async fn edge_ids(pool: &PgPool, tender: &Tender) -> Result<Vec<TenderSiaeId>> {
    Ok(TenderSiae::find_for_tender(tender.id, pool)
        .await?
        .into_iter()
        .map(|edge| edge.id)
        .collect())
}
