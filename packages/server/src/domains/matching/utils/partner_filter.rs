//! Pure partner roster selection.

use std::collections::HashMap;

use crate::common::PerimeterId;
use crate::domains::reference::{PartnerShareTender, Perimeter, PerimeterKind, TenderAmount};

/// Rosters to notify for a tender.
///
/// `tender_perimeters` holds the tender's perimeters and location.
/// `known_perimeters` resolves roster perimeter ids; unresolved ids only match
/// by id.
pub fn filter_partners<'a>(
    rosters: &'a [PartnerShareTender],
    tender_perimeters: &[Perimeter],
    tender_amount: Option<TenderAmount>,
    known_perimeters: &HashMap<PerimeterId, Perimeter>,
) -> Vec<&'a PartnerShareTender> {
    rosters
        .iter()
        .filter(|roster| roster.is_active)
        .filter(|roster| perimeters_match(roster, tender_perimeters, known_perimeters))
        .filter(|roster| amount_matches(roster, tender_amount))
        .collect()
}

fn perimeters_match(
    roster: &PartnerShareTender,
    tender_perimeters: &[Perimeter],
    known_perimeters: &HashMap<PerimeterId, Perimeter>,
) -> bool {
    if roster.perimeter_ids.is_empty() {
        return true;
    }

    roster.perimeter_ids.iter().any(|roster_id| {
        tender_perimeters.iter().any(|tender_perimeter| {
            if tender_perimeter.id == *roster_id {
                return true;
            }
            // A departmental tender reaches rosters covering its region.
            match (tender_perimeter.kind, known_perimeters.get(roster_id)) {
                (PerimeterKind::Department, Some(roster_perimeter)) => {
                    roster_perimeter.kind == PerimeterKind::Region
                        && tender_perimeter.region_code.as_deref()
                            == Some(roster_perimeter.insee_code.as_str())
                }
                _ => false,
            }
        })
    })
}

fn amount_matches(roster: &PartnerShareTender, tender_amount: Option<TenderAmount>) -> bool {
    match (roster.amount_in, tender_amount) {
        (None, _) => true,
        (Some(floor), Some(amount)) => amount >= floor,
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PartnerShareTenderId;
    use chrono::Utc;

    fn perimeter(kind: PerimeterKind, code: &str, region: Option<&str>) -> Perimeter {
        Perimeter {
            id: PerimeterId::new(),
            slug: code.to_string(),
            name: code.to_string(),
            kind,
            insee_code: code.to_string(),
            department_code: None,
            region_code: region.map(String::from),
            post_codes: vec![],
            latitude: None,
            longitude: None,
        }
    }

    fn roster(name: &str, perimeter_ids: Vec<PerimeterId>, amount_in: Option<TenderAmount>) -> PartnerShareTender {
        PartnerShareTender {
            id: PartnerShareTenderId::new(),
            name: name.to_string(),
            perimeter_ids,
            amount_in,
            is_active: true,
            contact_email_list: vec![format!("{}@partner.fr", name.to_lowercase())],
            created_at: Utc::now(),
        }
    }

    fn names(selected: &[&PartnerShareTender]) -> Vec<String> {
        selected.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn empty_perimeters_match_every_tender() {
        let rosters = vec![roster("Everywhere", vec![], None)];
        let selected = filter_partners(&rosters, &[], None, &HashMap::new());
        assert_eq!(names(&selected), vec!["Everywhere"]);
    }

    #[test]
    fn inactive_rosters_are_skipped() {
        let mut inactive = roster("Off", vec![], None);
        inactive.is_active = false;
        let rosters = vec![inactive];
        assert!(filter_partners(&rosters, &[], None, &HashMap::new()).is_empty());
    }

    #[test]
    fn perimeter_intersection_by_id() {
        let isere = perimeter(PerimeterKind::Department, "38", Some("84"));
        let gironde = perimeter(PerimeterKind::Department, "33", Some("75"));
        let rosters = vec![
            roster("Isere", vec![isere.id], None),
            roster("Gironde", vec![gironde.id], None),
        ];

        let selected = filter_partners(&rosters, &[isere.clone()], None, &HashMap::new());
        assert_eq!(names(&selected), vec!["Isere"]);
    }

    #[test]
    fn departmental_tender_reaches_regional_roster() {
        let isere = perimeter(PerimeterKind::Department, "38", Some("84"));
        let aura = perimeter(PerimeterKind::Region, "84", None);
        let idf = perimeter(PerimeterKind::Region, "11", None);
        let known: HashMap<_, _> = [(aura.id, aura.clone()), (idf.id, idf.clone())].into();
        let rosters = vec![roster("Aura", vec![aura.id], None), roster("Idf", vec![idf.id], None)];

        let selected = filter_partners(&rosters, &[isere], None, &known);
        assert_eq!(names(&selected), vec!["Aura"]);
    }

    #[test]
    fn amount_floor_uses_band_ordering() {
        let rosters = vec![roster("Big", vec![], Some(TenderAmount::From50KTo100K))];

        for (amount, expected) in [
            (Some(TenderAmount::From30KTo50K), false),
            (Some(TenderAmount::From50KTo100K), true),
            (Some(TenderAmount::Over1M), true),
            (None, false),
        ] {
            let selected = filter_partners(&rosters, &[], amount, &HashMap::new());
            assert_eq!(!selected.is_empty(), expected, "{amount:?}");
        }
    }
}
