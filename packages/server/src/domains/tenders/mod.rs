//! Tenders: the lifecycle of a procurement need, from submission to the
//! transaction surveys.

pub mod activities;
pub mod emails;
pub mod machines;
pub mod models;
pub mod utils;

pub use models::{Tender, TenderInput, TenderSiae, TenderStatus};
