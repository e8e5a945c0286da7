//! Reference data: perimeters, sectors, suppliers, users and partner rosters.
//! Loaded by external importers; the engine only reads it.

pub mod gateway;
pub mod models;

pub use gateway::{PassSnapshot, Supplier, SupplierSnapshot, SupplierUser};
pub use models::*;
