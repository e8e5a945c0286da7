use thiserror::Error;

/// Errors surfaced by tender engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Tender attributes violate a constraint. The caller corrects and retries.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No identity was presented for an operation that needs one.
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Permission denied: {0}")]
    Authorization(String),

    /// A first-writer-wins field was already set; nothing changed.
    #[error("Already recorded: {0}")]
    Conflict(String),

    #[error("External service failed: {0}")]
    TransientExternal(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Postgres unique-violation check, used to detect slug collisions.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("23505")
                && db.constraint().map_or(true, |c| c == constraint)
        }
        _ => false,
    }
}
