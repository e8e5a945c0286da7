//! Caller identity as seen by engine operations.

use crate::common::{EngineError, UserId};

/// The authenticated user behind a request or an email deep link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    pub fn require_admin(&self) -> Result<(), EngineError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(EngineError::forbidden("moderator access required"))
        }
    }
}

/// Unwrap an optional identity or fail with `AuthenticationRequired`.
pub fn require_actor(actor: Option<Actor>) -> Result<Actor, EngineError> {
    actor.ok_or(EngineError::AuthenticationRequired)
}
