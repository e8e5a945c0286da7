//! Supplier matching and partner broadcast selection.

pub mod loader;
pub mod utils;

pub use loader::{load_targeting, matching_partners};
pub use utils::{filter_partners, match_suppliers, rank_suppliers, super_supplier_cmp, Targeting};
