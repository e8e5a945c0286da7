pub mod partner;
pub mod perimeter;
pub mod sector;
pub mod siae;
pub mod user;

pub use partner::*;
pub use perimeter::*;
pub use sector::*;
pub use siae::*;
pub use user::*;
