//! Pure matching logic: no I/O, fully unit tested.

pub mod matcher;
pub mod partner_filter;
pub mod ranking;

pub use matcher::*;
pub use partner_filter::*;
pub use ranking::*;
