pub mod geo;
pub mod slug;

pub use geo::*;
pub use slug::*;
