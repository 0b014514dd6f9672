//! # Host Bridge Traits
//!
//! Capability traits the core depends on but never implements itself.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - single-attempt async HTTP
//! - [`FileMover`](storage::FileMover) - move with `_dupN` dedup, write-back, empty dir cleanup
//!
//! Desktop implementations live in `bridge-desktop`. Tests use `mockall`
//! doubles of these traits.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map timeouts and connection failures to the dedicated variants so
//! callers can classify them as transient.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`.

pub mod error;
pub mod http;
pub mod storage;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::FileMover;
