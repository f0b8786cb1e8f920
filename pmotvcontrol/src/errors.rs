use pmotvsource::SourceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    // Load errors: rejected before any state change
    #[error("Empty URL")]
    EmptyUrl,
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
    #[error("Nothing to play: no source is ready")]
    NothingToPlay,

    // Ownership
    #[error("Ownership denied: the session is locked")]
    OwnershipDenied,
    #[error("Not authorized to {0}")]
    NotAuthorized(&'static str),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

impl ControllerError {
    /// True for errors raised before the record was touched.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ControllerError::EmptyUrl | ControllerError::MalformedUrl(_) | ControllerError::NothingToPlay
        )
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
