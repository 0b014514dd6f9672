use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to extract metadata: {0}")]
    ExtractionFailed(String),

    #[error("Incomplete tags: {0}")]
    IncompleteTags(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read lyrics: {0}")]
    LyricsReadFailed(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    /// Errors that mean "this audio file cannot be processed", as opposed to
    /// lyric-side failures.
    pub fn is_tag_error(&self) -> bool {
        matches!(
            self,
            MetadataError::ExtractionFailed(_)
                | MetadataError::IncompleteTags(_)
                | MetadataError::FileNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
