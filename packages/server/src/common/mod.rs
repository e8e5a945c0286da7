// Common types and utilities shared across the application

pub mod auth;
pub mod entity_ids;
pub mod error;
pub mod id;
pub mod logs;
pub mod utils;

pub use auth::{require_actor, Actor};
pub use entity_ids::*;
pub use error::{is_unique_violation, EngineError, EngineResult};
pub use id::{Id, V4, V7};
pub use logs::LogEntry;
