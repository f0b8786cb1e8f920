//! Types d'erreurs pour pmotvsource

/// Erreurs de manipulation des sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source index {0} does not exist")]
    NoSuchSource(usize),

    #[error("Source {0} is not a {1}")]
    WrongKind(usize, &'static str),

    #[error("Track index {index} out of range (len {len})")]
    TrackOutOfRange { index: usize, len: usize },

    #[error("Empty URL")]
    EmptyUrl,

    #[error("Queue is full ({0} entries)")]
    QueueFull(usize),

    #[error("Player {player} already has {limit} queued entries")]
    PlayerQueueLimit { player: u32, limit: usize },

    #[error("Playlist is in catalog mode: only jump-to is allowed")]
    CatalogMode,

    #[error("Operation '{0}' is not supported by {1} sources")]
    NotSupported(&'static str, &'static str),

    #[error("Playlist parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SourceError {
    pub fn not_supported(operation: &'static str, kind: &'static str) -> Self {
        SourceError::NotSupported(operation, kind)
    }
}

/// Type Result spécialisé pour pmotvsource
pub type Result<T> = std::result::Result<T, SourceError>;
