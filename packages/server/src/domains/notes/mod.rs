//! Free-text notes attached to a tender, a supplier or a user.

pub mod activities;
pub mod models;

pub use activities::{add_note, list_notes};
pub use models::{Note, NoteParent};
