use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid document path '{0}'")]
    InvalidPath(String),

    #[error("batch rejected: precondition failed on '{0}'")]
    PreconditionFailed(String),

    #[error("invalid blob name '{0}'")]
    InvalidBlobName(String),

    #[error("refusing to store an empty blob")]
    EmptyBlob,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
