//! Retry policy for lyrics service calls.
//!
//! Every call is classified into an [`Outcome`]; [`RetryState`] turns the
//! sequence of outcomes for one call into a [`RetryDecision`]. The state
//! machine is independent of any call site so it can be driven with
//! synthetic outcomes in tests. [`RetryPolicy::run`] wires it to a real
//! async call, with backoff sleeps that race a cancellation token.
//!
//! Backoff: 1s, 2s, 4s, 8s, 16s, then 30s for every later retry, each
//! scaled by a random factor in `1 ± jitter_ratio`.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::HttpResponse;
use core_runtime::config::RetrySettings;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{PublishError, Result};

/// Classification of a single call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// 5xx
    RetryableServerError,
    /// 4xx other than 404, or a request that could not be built
    NonRetryableClientError,
    /// 404, a valid empty result
    NotFound,
    /// Connection failure or timeout
    TransportFailure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::RetryableServerError => "server_error",
            Outcome::NonRetryableClientError => "client_error",
            Outcome::NotFound => "not_found",
            Outcome::TransportFailure => "transport_failure",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Outcome::RetryableServerError | Outcome::TransportFailure
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the result of one `HttpClient::execute` call.
pub fn classify(result: &BridgeResult<HttpResponse>) -> Outcome {
    match result {
        Ok(response) if response.is_success() => Outcome::Success,
        Ok(response) if response.status == 404 => Outcome::NotFound,
        Ok(response) if response.is_server_error() => Outcome::RetryableServerError,
        Ok(_) => Outcome::NonRetryableClientError,
        Err(e) if e.is_transport() => Outcome::TransportFailure,
        Err(_) => Outcome::NonRetryableClientError,
    }
}

/// What to do after recording an outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Success or NotFound: hand the result to the caller.
    Accept,
    /// Non-retryable failure: fail now, keeping the remaining budget.
    Reject,
    /// Wait, then try again.
    RetryAfter(Duration),
    /// Retryable failure with no attempts left.
    Exhausted,
}

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
            jitter_ratio: settings.jitter_ratio,
        }
    }

    /// Policy without jitter, for deterministic schedules.
    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    /// Delay before retry number `retry` (0-based), before jitter.
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// [`Self::nominal_delay`] scaled by a random factor in `1 ± jitter_ratio`.
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let nominal = self.nominal_delay(retry);
        if self.jitter_ratio <= 0.0 {
            return nominal;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter_ratio..=1.0 + self.jitter_ratio);
        nominal.mul_f64(factor)
    }

    /// Run `call` until it succeeds, hits a non-retryable outcome, or the
    /// attempt budget runs out. `label` names the call in logs and errors.
    pub async fn run<F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<CallResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BridgeResult<HttpResponse>>,
    {
        let mut state = RetryState::new();

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                result = call() => result,
            };

            let outcome = classify(&result);
            match state.record(outcome, self) {
                RetryDecision::Accept => {
                    debug!(label, attempts = state.attempts(), %outcome, "Call finished");
                    return match result {
                        Ok(response) if outcome == Outcome::Success => {
                            Ok(CallResult::Success(response))
                        }
                        _ => Ok(CallResult::NotFound),
                    };
                }
                RetryDecision::Reject => {
                    return Err(match result {
                        Ok(response) => {
                            let body = String::from_utf8_lossy(&response.body);
                            warn!(label, status = response.status, "Request rejected");
                            PublishError::ClientError {
                                label: label.to_string(),
                                status: response.status,
                                body: body.chars().take(200).collect(),
                            }
                        }
                        Err(e) => PublishError::Bridge(e),
                    });
                }
                RetryDecision::Exhausted => {
                    warn!(label, attempts = state.attempts(), %outcome, "Retries exhausted");
                    return Err(PublishError::RetriesExhausted {
                        label: label.to_string(),
                        attempts: state.attempts(),
                        last: outcome,
                    });
                }
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        label,
                        attempt = state.attempts(),
                        max_attempts = self.max_attempts,
                        %outcome,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after delay"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Accepted result of a call.
#[derive(Debug)]
pub enum CallResult {
    Success(HttpResponse),
    NotFound,
}

/// Per-call retry bookkeeping. Created fresh for every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    attempts: u32,
    total_backoff: Duration,
    last_outcome: Option<Outcome>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sum of all scheduled backoff delays so far.
    pub fn total_backoff(&self) -> Duration {
        self.total_backoff
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// Record the outcome of the attempt just made.
    pub fn record(&mut self, outcome: Outcome, policy: &RetryPolicy) -> RetryDecision {
        self.attempts += 1;
        self.last_outcome = Some(outcome);

        match outcome {
            Outcome::Success | Outcome::NotFound => RetryDecision::Accept,
            Outcome::NonRetryableClientError => RetryDecision::Reject,
            Outcome::RetryableServerError | Outcome::TransportFailure => {
                if self.attempts >= policy.max_attempts {
                    RetryDecision::Exhausted
                } else {
                    let delay = policy.jittered_delay(self.attempts - 1);
                    self.total_backoff += delay;
                    RetryDecision::RetryAfter(delay)
                }
            }
        }
    }
}
