use bridge_traits::error::BridgeError;
use thiserror::Error;

use crate::retry::Outcome;

/// Proof-of-work failures. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Solver gave up after {elapsed_ms} ms ({nonces} nonces tried)")]
    Timeout { elapsed_ms: u128, nonces: u64 },

    #[error("Invalid challenge target: {0}")]
    InvalidTarget(String),

    #[error("Solver cancelled")]
    Cancelled,

    #[error("Solver task failed: {0}")]
    Task(String),
}

impl SolverError {
    /// Misconfiguration rather than bad luck; worth a run-level warning.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, SolverError::InvalidTarget(_) | SolverError::Task(_))
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{label}: HTTP {status}: {body}")]
    ClientError {
        label: String,
        status: u16,
        body: String,
    },

    #[error("{label}: gave up after {attempts} attempts (last: {last})")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        last: Outcome,
    },

    #[error("{label}: unexpected response: {reason}")]
    Protocol { label: String, reason: String },

    #[error("Proof of work failed: {0}")]
    Solver(#[from] SolverError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },
}

impl PublishError {
    /// Retries ran out on connection or timeout failures.
    pub fn is_transport_exhaustion(&self) -> bool {
        matches!(
            self,
            PublishError::RetriesExhausted {
                last: Outcome::TransportFailure,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
