//! Time-driven follow-ups: supplier reminders, author top suppliers,
//! transaction surveys and auto-rejection of abandoned drafts.
//!
//! Each job is a predicate over persisted state evaluated at an explicit
//! `now`; what was already done is recorded in logs or stamps and excluded by
//! the next selection.

pub mod activities;
pub mod jobs;
pub mod windows;

pub use jobs::FollowupJob;
pub use windows::reminder_window;
