//! "Super-supplier" ordering.
//!
//! Suppliers with registered users come first, then those with a logo, a
//! description, declared offers, and finally the most recently updated. Ties
//! break on id so the order is total and stable across runs.

use std::cmp::Ordering;

use crate::domains::reference::Supplier;

pub fn super_supplier_cmp(a: &Supplier, b: &Supplier) -> Ordering {
    b.has_users()
        .cmp(&a.has_users())
        .then_with(|| b.has_logo.cmp(&a.has_logo))
        .then_with(|| b.has_description.cmp(&a.has_description))
        .then_with(|| (b.offer_count > 0).cmp(&(a.offer_count > 0)))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn rank_suppliers(suppliers: &mut [&Supplier]) {
    suppliers.sort_by(|a, b| super_supplier_cmp(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SiaeId, UserId};
    use crate::domains::reference::{gateway::SupplierUser, SiaeKind};
    use chrono::{Duration, TimeZone, Utc};

    fn supplier(name: &str) -> Supplier {
        Supplier {
            id: SiaeId::new(),
            slug: name.to_lowercase(),
            name: name.to_string(),
            kind: SiaeKind::Ei,
            contact_email: Some(format!("{}@siae.fr", name.to_lowercase())),
            coordinate: None,
            users: vec![],
            has_logo: false,
            has_description: false,
            offer_count: 0,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            activities: vec![],
        }
    }

    #[test]
    fn users_outrank_everything_else() {
        let mut with_users = supplier("Users");
        with_users.users = vec![SupplierUser {
            id: UserId::new(),
            email: "u@siae.fr".into(),
        }];

        let mut polished = supplier("Polished");
        polished.has_logo = true;
        polished.has_description = true;
        polished.offer_count = 3;

        let mut list = vec![&polished, &with_users];
        rank_suppliers(&mut list);
        assert_eq!(list[0].name, "Users");
    }

    #[test]
    fn criteria_apply_in_order() {
        let plain = supplier("Plain");

        let mut logo = supplier("Logo");
        logo.has_logo = true;

        let mut description = supplier("Description");
        description.has_description = true;

        let mut offers = supplier("Offers");
        offers.offer_count = 2;

        let mut recent = supplier("Recent");
        recent.updated_at = plain.updated_at + Duration::days(10);

        let mut list = vec![&plain, &recent, &offers, &description, &logo];
        rank_suppliers(&mut list);

        let names: Vec<&str> = list.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Logo", "Description", "Offers", "Recent", "Plain"]);
    }

    #[test]
    fn ties_break_on_id() {
        let a = supplier("A");
        let b = supplier("B");
        let (first, second) = if a.id < b.id { (&a, &b) } else { (&b, &a) };

        let mut list = vec![second, first];
        rank_suppliers(&mut list);
        assert_eq!(list[0].id, first.id);
    }
}
