use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid call transition: {0}")]
    InvalidTransition(String),

    #[error("Credential acquisition failed: {0}")]
    CredentialAcquisition(String),

    #[error("No local media source available")]
    NoMediaSource,

    #[error("A recording is already active")]
    AlreadyRecording,

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error leaves the operation retryable with unchanged state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition(_) | Self::AlreadyRecording | Self::Upload(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
