pub mod interactions;
pub mod listing;
pub mod moderation;
pub mod submission;
pub mod surveys;

pub use interactions::*;
pub use listing::*;
pub use moderation::*;
pub use submission::{create_tender, submit_tender, update_tender};
pub use surveys::*;
