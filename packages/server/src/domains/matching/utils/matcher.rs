//! Pure supplier matching.
//!
//! A supplier matches when at least one of its activities passes all three
//! stages: kind and presta type, sector, then geography. Stages are checked
//! on the same activity; passing each stage on a different activity is not
//! enough.

use crate::common::utils::Coordinate;
use crate::common::{PerimeterId, SectorId};
use crate::domains::reference::{
    gateway::{ActivityScope, ZoneRef},
    GeoRange, Perimeter, PerimeterKind, PrestaType, SiaeKind, Supplier, SupplierSnapshot,
};
use crate::domains::tenders::models::Tender;

use super::ranking::rank_suppliers;

/// Targeting of one tender with its perimeters resolved.
#[derive(Debug, Clone, Default)]
pub struct Targeting {
    pub siae_kinds: Vec<SiaeKind>,
    pub presta_types: Vec<PrestaType>,
    pub sector_ids: Vec<SectorId>,
    pub is_country_area: bool,
    pub include_country_area: bool,
    pub perimeters: Vec<Perimeter>,
    pub location: Option<Perimeter>,
    pub distance_km: Option<f64>,
}

impl Targeting {
    /// `perimeters` and `location` are the tender's `perimeter_ids` and
    /// `location_id`, resolved.
    pub fn for_tender(tender: &Tender, perimeters: Vec<Perimeter>, location: Option<Perimeter>) -> Self {
        Self {
            siae_kinds: tender.siae_kind.clone(),
            presta_types: tender.presta_type.clone(),
            sector_ids: tender.sector_ids.clone(),
            is_country_area: tender.is_country_area,
            include_country_area: tender.include_country_area,
            perimeters,
            location,
            distance_km: tender.distance_location.map(f64::from),
        }
    }

    fn geo_rule(&self) -> GeoRule<'_> {
        if self.is_country_area {
            return GeoRule::Country;
        }
        if let (Some(km), Some(city)) = (self.distance_km, self.location.as_ref()) {
            if city.kind == PerimeterKind::City {
                return GeoRule::Radius {
                    city,
                    center: city.coordinate(),
                    km,
                };
            }
        }
        if !self.perimeters.is_empty() {
            return GeoRule::Perimeters(&self.perimeters);
        }
        GeoRule::Anywhere
    }
}

enum GeoRule<'a> {
    Country,
    Radius {
        city: &'a Perimeter,
        center: Option<Coordinate>,
        km: f64,
    },
    Perimeters(&'a [Perimeter]),
    Anywhere,
}

/// Eligible suppliers, best first.
pub fn match_suppliers<'a>(targeting: &Targeting, snapshot: &'a SupplierSnapshot) -> Vec<&'a Supplier> {
    let rule = targeting.geo_rule();
    let mut matched: Vec<&Supplier> = snapshot
        .suppliers
        .iter()
        .filter(|supplier| supplier_matches(targeting, &rule, supplier))
        .collect();
    rank_suppliers(&mut matched);
    matched
}

fn supplier_matches(targeting: &Targeting, rule: &GeoRule<'_>, supplier: &Supplier) -> bool {
    if !targeting.siae_kinds.is_empty() && !targeting.siae_kinds.contains(&supplier.kind) {
        return false;
    }

    supplier.activities.iter().any(|activity| {
        passes_presta(targeting, activity)
            && passes_sector(targeting, activity)
            && passes_geo(targeting, rule, supplier, activity)
    })
}

fn passes_presta(targeting: &Targeting, activity: &ActivityScope) -> bool {
    targeting.presta_types.is_empty()
        || activity
            .presta_types
            .iter()
            .any(|p| targeting.presta_types.contains(p))
}

fn passes_sector(targeting: &Targeting, activity: &ActivityScope) -> bool {
    targeting.sector_ids.is_empty()
        || activity
            .sector_ids
            .iter()
            .any(|s| targeting.sector_ids.contains(s))
}

fn passes_geo(targeting: &Targeting, rule: &GeoRule<'_>, supplier: &Supplier, activity: &ActivityScope) -> bool {
    let country_ok = activity.geo_range == GeoRange::Country;

    match rule {
        GeoRule::Country => country_ok,
        GeoRule::Anywhere => true,
        GeoRule::Radius { city, center, km } => {
            let within_radius = match (center, supplier.coordinate) {
                (Some(center), Some(coord)) => center.distance_km(&coord) <= *km,
                _ => false,
            };
            within_radius
                || covers_zone(activity, PerimeterKind::Department, city.department_code.as_deref())
                || covers_zone(activity, PerimeterKind::Region, city.region_code.as_deref())
                || (targeting.include_country_area && country_ok)
        }
        GeoRule::Perimeters(perimeters) => perimeters.iter().any(|perimeter| {
            covers_perimeter(activity, perimeter)
                || within_custom_distance(supplier, activity, perimeter)
                || (targeting.include_country_area && country_ok)
        }),
    }
}

/// Activity lists the perimeter itself or one of its parents.
fn covers_perimeter(activity: &ActivityScope, perimeter: &Perimeter) -> bool {
    if activity.geo_range != GeoRange::Zones {
        return false;
    }
    if lists(activity, perimeter.id) {
        return true;
    }
    match perimeter.kind {
        PerimeterKind::City => {
            covers_zone(activity, PerimeterKind::Department, perimeter.department_code.as_deref())
                || covers_zone(activity, PerimeterKind::Region, perimeter.region_code.as_deref())
        }
        PerimeterKind::Department => {
            covers_zone(activity, PerimeterKind::Region, perimeter.region_code.as_deref())
        }
        PerimeterKind::Region => false,
    }
}

fn lists(activity: &ActivityScope, id: PerimeterId) -> bool {
    activity.zones.iter().any(|zone| zone.id == id)
}

fn covers_zone(activity: &ActivityScope, kind: PerimeterKind, code: Option<&str>) -> bool {
    let Some(code) = code else {
        return false;
    };
    activity.geo_range == GeoRange::Zones
        && activity
            .zones
            .iter()
            .any(|ZoneRef { kind: k, insee_code, .. }| *k == kind && insee_code == code)
}

fn within_custom_distance(supplier: &Supplier, activity: &ActivityScope, perimeter: &Perimeter) -> bool {
    if activity.geo_range != GeoRange::Custom || perimeter.kind != PerimeterKind::City {
        return false;
    }
    match (activity.custom_distance_km, supplier.coordinate, perimeter.coordinate()) {
        (Some(max_km), Some(from), Some(to)) => from.distance_km(&to) <= max_km,
        _ => false,
    }
}
