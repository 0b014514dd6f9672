//! # Core Runtime Module
//!
//! Foundational runtime pieces shared by every other crate:
//! - Configuration resolved once at startup (CLI > environment > defaults)
//! - Logging and tracing setup
//!
//! Nothing here touches the network or the lyric library; the rest of the
//! workspace receives an [`AppConfig`](config::AppConfig) by reference and
//! never reads configuration sources itself.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, AppConfigBuilder, InstrumentalPayload, RetrySettings};
pub use error::{Error, Result};
