use thiserror::Error;

/// Failures reported by every store backend, in-process or PostgREST.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A conditional write found the row in a different state than expected.
    #[error("Stale write: {0}")]
    StaleWrite(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    pub fn is_stale_write(&self) -> bool {
        matches!(self, DatabaseError::StaleWrite(_))
    }
}
