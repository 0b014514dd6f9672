//! # Publish State Machine
//!
//! Drives one track from lookup to publication.
//!
//! ```text
//! Idle → CheckingCache ──hit──→ Published
//!             │
//!             ↓ miss
//!        CheckingExternal ──found──→ AwaitingUserDecision
//!             │ miss                    │ use external / use local
//!             ↓                         ↓
//!        RequestingChallenge ←──────────┘
//!             ↓
//!          Solving → Publishing → Published
//! ```
//!
//! `Skipped` is reachable from `Idle`, `CheckingExternal` and
//! `AwaitingUserDecision`. `Aborted` is reachable from every non-terminal
//! state and is entered whenever a step fails or the run is cancelled.
//!
//! The machine never prompts. Callers run [`Publisher::lookup`], put any
//! operator choice through [`Publisher::resolve`], then call
//! [`Publisher::submit`] or [`Publisher::skip`].

use core_metadata::{CleansedLyrics, TrackMetadata};
use core_runtime::config::{AppConfig, InstrumentalPayload};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::LrclibClient;
use crate::decision::Decision;
use crate::error::{PublishError, Result, SolverError};
use crate::models::{LyricsQuery, LyricsRecord, PayloadSource, PublishPayload};
use crate::pow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishState {
    Idle,
    CheckingCache,
    CheckingExternal,
    AwaitingUserDecision,
    RequestingChallenge,
    Solving,
    Publishing,
    Published,
    Skipped,
    Aborted,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishState::Idle => "idle",
            PublishState::CheckingCache => "checking_cache",
            PublishState::CheckingExternal => "checking_external",
            PublishState::AwaitingUserDecision => "awaiting_user_decision",
            PublishState::RequestingChallenge => "requesting_challenge",
            PublishState::Solving => "solving",
            PublishState::Publishing => "publishing",
            PublishState::Published => "published",
            PublishState::Skipped => "skipped",
            PublishState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublishState::Published | PublishState::Skipped | PublishState::Aborted
        )
    }

    fn can_transition_to(&self, to: PublishState) -> bool {
        use PublishState::*;
        match (*self, to) {
            (from, Aborted) => !from.is_terminal(),

            (Idle, CheckingCache) | (Idle, Skipped) => true,

            (CheckingCache, Published) | (CheckingCache, CheckingExternal) => true,

            (CheckingExternal, AwaitingUserDecision)
            | (CheckingExternal, RequestingChallenge)
            | (CheckingExternal, Skipped) => true,

            (AwaitingUserDecision, RequestingChallenge) | (AwaitingUserDecision, Skipped) => true,

            (RequestingChallenge, Solving) => true,
            (Solving, Publishing) => true,
            (Publishing, Published) => true,

            _ => false,
        }
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a finished session. Failures are returned as errors instead.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published(PayloadSource),
    /// The service already held lyrics for this track; nothing was uploaded.
    AlreadyPublished(LyricsRecord),
    Skipped(String),
    /// Everything up to the challenge ran; nothing was uploaded.
    DryRun(PayloadSource),
}

impl PublishOutcome {
    /// Whether the track's files should be moved to the done directories.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            PublishOutcome::Published(_) | PublishOutcome::AlreadyPublished(_)
        )
    }
}

/// What [`Publisher::lookup`] found.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    AlreadyPublished(LyricsRecord),
    /// External lyrics exist; the session waits for [`Publisher::resolve`].
    External(LyricsRecord),
    Missing,
}

/// Per-track state, with every state visited kept in order.
#[derive(Debug, Clone)]
pub struct PublishSession {
    query: LyricsQuery,
    state: PublishState,
    history: Vec<PublishState>,
    external: Option<LyricsRecord>,
    use_external: bool,
}

impl PublishSession {
    pub fn new(query: LyricsQuery) -> Self {
        Self {
            query,
            state: PublishState::Idle,
            history: vec![PublishState::Idle],
            external: None,
            use_external: false,
        }
    }

    pub fn query(&self) -> &LyricsQuery {
        &self.query
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    pub fn history(&self) -> &[PublishState] {
        &self.history
    }

    pub fn external(&self) -> Option<&LyricsRecord> {
        self.external.as_ref()
    }

    pub fn transition(&mut self, to: PublishState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(PublishError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.state.as_str(),
                    to.as_str()
                ),
            });
        }
        debug!(track = %self.query.track_name, from = %self.state, to = %to, "Publish state");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Aborted` unless already terminal, then hand back `err`.
    fn fail(&mut self, err: PublishError) -> PublishError {
        if !self.state.is_terminal() {
            self.state = PublishState::Aborted;
            self.history.push(PublishState::Aborted);
        }
        err
    }
}

pub struct Publisher {
    client: LrclibClient,
    solver_timeout: Duration,
    instrumental_payload: InstrumentalPayload,
    dry_run: bool,
}

impl Publisher {
    pub fn new(client: LrclibClient, config: &AppConfig) -> Self {
        Self {
            client,
            solver_timeout: config.solver_timeout,
            instrumental_payload: config.instrumental_payload,
            dry_run: config.dry_run,
        }
    }

    pub fn client(&self) -> &LrclibClient {
        &self.client
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn begin(&self, track: &TrackMetadata) -> PublishSession {
        PublishSession::new(LyricsQuery::from_track(track))
    }

    /// Check the cache, then external sources.
    pub async fn lookup(
        &self,
        session: &mut PublishSession,
        cancel: &CancellationToken,
    ) -> Result<LookupResult> {
        session.transition(PublishState::CheckingCache)?;
        let cached = match self.client.get_cached(&session.query, cancel).await {
            Ok(cached) => cached,
            Err(e) => return Err(session.fail(e)),
        };
        if let Some(record) = cached {
            info!(query = %session.query, "Lyrics already published");
            session.transition(PublishState::Published)?;
            return Ok(LookupResult::AlreadyPublished(record));
        }

        session.transition(PublishState::CheckingExternal)?;
        let external = match self.client.get_external(&session.query, cancel).await {
            Ok(external) => external,
            Err(e) => return Err(session.fail(e)),
        };
        match external {
            Some(record) => {
                info!(query = %session.query, instrumental = record.instrumental, "External lyrics found");
                session.transition(PublishState::AwaitingUserDecision)?;
                session.external = Some(record.clone());
                Ok(LookupResult::External(record))
            }
            None => Ok(LookupResult::Missing),
        }
    }

    /// Apply the operator's answer about external lyrics.
    ///
    /// `UseExternal` and `UseLocal` keep the session open for
    /// [`Self::submit`]; `Skip` and `Abort` end it and return the outcome.
    pub fn resolve(
        &self,
        session: &mut PublishSession,
        decision: &Decision,
    ) -> Result<Option<PublishOutcome>> {
        if session.state != PublishState::AwaitingUserDecision {
            return Err(PublishError::InvalidStateTransition {
                from: session.state.as_str().to_string(),
                to: decision.as_str().to_string(),
                reason: "No external lyrics are awaiting a decision".to_string(),
            });
        }

        match decision {
            Decision::UseExternal => {
                session.use_external = true;
                Ok(None)
            }
            Decision::UseLocal => {
                session.use_external = false;
                Ok(None)
            }
            Decision::Skip => self.skip(session, "external lyrics declined").map(Some),
            Decision::Abort => Err(session.fail(PublishError::Cancelled)),
            other => Err(PublishError::InvalidStateTransition {
                from: session.state.as_str().to_string(),
                to: other.as_str().to_string(),
                reason: format!("Decision {} is not valid here", other),
            }),
        }
    }

    pub fn skip(&self, session: &mut PublishSession, reason: &str) -> Result<PublishOutcome> {
        session.transition(PublishState::Skipped)?;
        info!(query = %session.query, reason, "Skipped");
        Ok(PublishOutcome::Skipped(reason.to_string()))
    }

    /// Lyrics that [`Self::submit`] would send, and where they came from.
    pub fn payload_for(
        &self,
        session: &PublishSession,
        local: &CleansedLyrics,
    ) -> (PublishPayload, PayloadSource) {
        let (lyrics, source) = match (&session.external, session.use_external) {
            (Some(record), true) => (record.to_lyrics(), PayloadSource::External),
            _ if local.instrumental => (local.clone(), PayloadSource::Instrumental),
            _ => (local.clone(), PayloadSource::Local),
        };
        let payload = PublishPayload::new(&session.query, &lyrics, self.instrumental_payload);
        (payload, source)
    }

    /// Request a challenge, solve it and publish.
    ///
    /// In dry-run mode the session ends as `Skipped` before any challenge
    /// is requested.
    pub async fn submit(
        &self,
        session: &mut PublishSession,
        local: &CleansedLyrics,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome> {
        let (payload, source) = self.payload_for(session, local);

        if self.dry_run {
            session.transition(PublishState::Skipped)?;
            info!(query = %session.query, %source, "Dry run, not publishing");
            return Ok(PublishOutcome::DryRun(source));
        }

        match self.publish_payload(session, &payload, cancel).await {
            Ok(()) => Ok(PublishOutcome::Published(source)),
            Err(e) => Err(session.fail(e)),
        }
    }

    async fn publish_payload(
        &self,
        session: &mut PublishSession,
        payload: &PublishPayload,
        cancel: &CancellationToken,
    ) -> Result<()> {
        session.transition(PublishState::RequestingChallenge)?;
        let challenge = self.client.request_challenge(cancel).await?;

        session.transition(PublishState::Solving)?;
        let timeout = self.solver_timeout;
        let solver_cancel = cancel.clone();
        let token = tokio::task::spawn_blocking(move || {
            pow::solve(&challenge, timeout, &solver_cancel)
        })
        .await
        .map_err(|e| SolverError::Task(e.to_string()))?
        .map_err(|e| match e {
            SolverError::Cancelled => PublishError::Cancelled,
            other => PublishError::Solver(other),
        })?;

        session.transition(PublishState::Publishing)?;
        self.client.publish(payload, &token, cancel).await?;
        session.transition(PublishState::Published)?;
        Ok(())
    }
}
