pub mod tripwire;
pub mod validation;

pub use tripwire::*;
pub use validation::*;
