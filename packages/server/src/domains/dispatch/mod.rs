//! Dispatcher: turns a validated tender into supplier, partner and author
//! emails, in batches.

pub mod activities;

pub use activities::{dispatch_tender, run_dispatch_pass, DispatchMode, DispatchOutcome, DispatchStatus};
