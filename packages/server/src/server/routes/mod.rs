// HTTP routes
pub mod health;
pub mod interactions;
pub mod moderation;
pub mod notes;
pub mod surveys;
pub mod tenders;

pub use health::*;
pub use interactions::*;
pub use moderation::*;
pub use notes::*;
pub use surveys::*;
pub use tenders::*;

use axum::extract::Extension;

use crate::common::Actor;
use crate::server::middleware::AuthUser;

/// Session identity, when the request carried a valid token.
pub(crate) fn actor_of(auth: Option<Extension<AuthUser>>) -> Option<Actor> {
    auth.map(|Extension(user)| user.actor())
}
