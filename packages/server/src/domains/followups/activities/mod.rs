pub mod auto_reject;
pub mod reminders;
pub mod surveys;
pub mod top_suppliers;

pub use auto_reject::*;
pub use reminders::*;
pub use surveys::*;
pub use top_suppliers::*;
