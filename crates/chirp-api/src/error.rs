use thiserror::Error;

use chirp_db::{AuthError, StoreError};
use chirp_types::DecodeError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no signed-in user")]
    NoSession,

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("concurrent updates kept conflicting on {0}")]
    Conflict(String),

    /// The first write of a two-step operation landed, the second did not.
    #[error("{operation} left '{record}' partially written: {source}")]
    Partial {
        operation: &'static str,
        record: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
