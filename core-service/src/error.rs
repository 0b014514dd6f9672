use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Metadata error: {0}")]
    Metadata(#[from] core_metadata::MetadataError),

    #[error("Publish error: {0}")]
    Publish(#[from] core_publish::PublishError),

    #[error("File operation failed: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Run aborted by operator")]
    Aborted,

    #[error("Run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
