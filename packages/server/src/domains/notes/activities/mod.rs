pub mod commentary;

pub use commentary::*;
