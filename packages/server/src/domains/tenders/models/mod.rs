pub mod interest_notification;
pub mod question;
pub mod tender;
pub mod tender_siae;

pub use interest_notification::*;
pub use question::*;
pub use tender::*;
pub use tender_siae::*;
