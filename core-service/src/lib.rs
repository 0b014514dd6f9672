//! Pipeline orchestration and bootstrap helpers.
//!
//! This crate wires the host bridges (HTTP, file mover, tag reader) into
//! the lyric pipeline. Desktop builds enable the `desktop-shims` feature,
//! which provides [`bootstrap_desktop`] on top of `bridge-desktop`.

pub mod disposition;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod summary;

pub use error::{Result, ServiceError};
pub use pipeline::Pipeline;
pub use provider::DecisionProvider;
pub use summary::{FailureKind, RunSummary, TrackReport, TrackResult};

use std::sync::Arc;

use bridge_traits::{http::HttpClient, storage::FileMover};
use core_metadata::TagReader;

#[cfg(feature = "desktop-shims")]
use core_runtime::config::AppConfig;

/// Aggregated handle to the bridges the pipeline requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub files: Arc<dyn FileMover>,
    pub tags: Arc<dyn TagReader>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        files: Arc<dyn FileMover>,
        tags: Arc<dyn TagReader>,
    ) -> Self {
        Self {
            http_client,
            files,
            tags,
        }
    }
}

/// Desktop bridges: reqwest transport, local file mover, lofty tag reader.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::AppConfig;
///
/// let config = AppConfig::builder().tracks_dir("music").build().unwrap();
/// let deps = core_service::bootstrap_desktop(&config)?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: &AppConfig) -> Result<CoreDependencies> {
    let http = bridge_desktop::ReqwestHttpClient::new(&config.user_agent, config.request_timeout)
        .map_err(|err| ServiceError::InitializationFailed(err.to_string()))?;
    Ok(CoreDependencies::new(
        Arc::new(http),
        Arc::new(bridge_desktop::LocalFileMover::new()),
        Arc::new(core_metadata::MetadataExtractor::new()),
    ))
}
