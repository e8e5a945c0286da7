pub mod dispatch_tender;
pub mod run_pass;

pub use dispatch_tender::*;
pub use run_pass::*;
