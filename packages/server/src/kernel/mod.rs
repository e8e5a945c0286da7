//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod email;
pub mod pass;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use deps::{BrevoAdapter, LogEmailService, ServerDeps};
pub use email::{deliver_all, DeliveryReport, EmailEvent, EmailKind};
pub use pass::{run_tenders, PassBudget, PassSummary};
pub use test_dependencies::{MockEmailService, TestDependencies};
pub use traits::*;
