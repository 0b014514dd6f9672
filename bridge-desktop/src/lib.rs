//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest` (rustls)
//! - `FileMover` using `tokio::fs`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LocalFileMover, ReqwestHttpClient};
//! use std::time::Duration;
//!
//! let http = ReqwestHttpClient::new("lrcup/0.1.0", Duration::from_secs(20))?;
//! let mover = LocalFileMover::new();
//! ```

mod filesystem;
mod http;

pub use filesystem::LocalFileMover;
pub use http::ReqwestHttpClient;
