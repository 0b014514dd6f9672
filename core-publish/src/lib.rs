//! # Publish Module
//!
//! Talks to the LRCLIB lyrics service:
//! - Lookup of cached and external lyrics ([`client`])
//! - Retry with exponential backoff ([`retry`])
//! - Proof-of-work publish tokens ([`pow`])
//! - The per-track publish state machine ([`publisher`])
//!
//! All network traffic goes through [`bridge_traits::http::HttpClient`], a
//! single-attempt contract; retries live here. Every long wait observes a
//! [`tokio_util::sync::CancellationToken`].

pub mod client;
pub mod decision;
pub mod error;
pub mod models;
pub mod pow;
pub mod publisher;
pub mod retry;

pub use client::LrclibClient;
pub use decision::Decision;
pub use error::{PublishError, Result, SolverError};
pub use models::{LyricsQuery, LyricsRecord, PayloadSource, PublishPayload};
pub use pow::{Challenge, PublishToken};
pub use publisher::{LookupResult, PublishOutcome, PublishSession, PublishState, Publisher};
pub use retry::{Outcome, RetryPolicy};
