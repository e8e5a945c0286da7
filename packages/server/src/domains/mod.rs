// Business domains
pub mod auth;
pub mod dispatch;
pub mod followups;
pub mod matching;
pub mod notes;
pub mod reference;
pub mod tenders;
