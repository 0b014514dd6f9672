//! Proof-of-work for publish tokens.
//!
//! The service hands out a `prefix` and a 256-bit `target` (64 hex chars).
//! A nonce is valid when `sha256(prefix + decimal(nonce))`, read as a
//! big-endian number, is at most the target. The solver returns the
//! smallest such nonce, so results are reproducible.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SolverError;

/// How many nonces to try between cancellation and deadline checks.
const CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Challenge {
    pub prefix: String,
    pub target: String,
}

impl Challenge {
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            target: target.into(),
        }
    }

    /// Decode the target into its 32 raw bytes.
    pub fn target_bytes(&self) -> Result<[u8; 32], SolverError> {
        let decoded = hex::decode(self.target.trim())
            .map_err(|e| SolverError::InvalidTarget(format!("{}: {}", self.target, e)))?;
        decoded.try_into().map_err(|bytes: Vec<u8>| {
            SolverError::InvalidTarget(format!("expected 32 bytes, got {}", bytes.len()))
        })
    }
}

/// Solved challenge, sent as `X-Publish-Token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishToken {
    pub prefix: String,
    pub nonce: u64,
}

impl fmt::Display for PublishToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.nonce)
    }
}

fn digest_for(prefixed: &Sha256, nonce: u64) -> [u8; 32] {
    let mut hasher = prefixed.clone();
    hasher.update(nonce.to_string().as_bytes());
    hasher.finalize().into()
}

/// Whether `nonce` satisfies `challenge`.
pub fn verify_nonce(challenge: &Challenge, nonce: u64) -> Result<bool, SolverError> {
    let target = challenge.target_bytes()?;
    let prefixed = Sha256::new_with_prefix(challenge.prefix.as_bytes());
    Ok(digest_for(&prefixed, nonce) <= target)
}

/// Find the smallest valid nonce, scanning upward from 0.
///
/// CPU-bound; callers on an async runtime should run this on a blocking
/// thread. Gives up with [`SolverError::Timeout`] once `timeout` has passed
/// and with [`SolverError::Cancelled`] once `cancel` fires.
pub fn solve(
    challenge: &Challenge,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<PublishToken, SolverError> {
    let target = challenge.target_bytes()?;
    let prefixed = Sha256::new_with_prefix(challenge.prefix.as_bytes());
    let started = Instant::now();

    debug!(prefix = %challenge.prefix, target = %challenge.target, "Solving challenge");

    let mut nonce: u64 = 0;
    loop {
        if digest_for(&prefixed, nonce) <= target {
            info!(
                nonce,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Challenge solved"
            );
            return Ok(PublishToken {
                prefix: challenge.prefix.clone(),
                nonce,
            });
        }

        nonce = nonce.checked_add(1).ok_or(SolverError::Timeout {
            elapsed_ms: started.elapsed().as_millis(),
            nonces: u64::MAX,
        })?;

        if nonce % CHECK_INTERVAL == 0 {
            if cancel.is_cancelled() {
                return Err(SolverError::Cancelled);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(SolverError::Timeout {
                    elapsed_ms: elapsed.as_millis(),
                    nonces: nonce,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EASY_TARGET: &str = "000fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

    fn solve_quick(challenge: &Challenge) -> Result<PublishToken, SolverError> {
        solve(challenge, Duration::from_secs(60), &CancellationToken::new())
    }

    #[test]
    fn test_solve_known_challenge() {
        let challenge = Challenge::new("lrcup-test-prefix", EASY_TARGET);
        let token = solve_quick(&challenge).unwrap();

        assert_eq!(token.nonce, 3609);
        assert_eq!(token.to_string(), "lrcup-test-prefix:3609");
        assert!(verify_nonce(&challenge, 3609).unwrap());
    }

    #[test]
    fn test_solution_is_smallest() {
        let challenge = Challenge::new("lrcup-test-prefix", EASY_TARGET);
        let token = solve_quick(&challenge).unwrap();
        for nonce in 0..token.nonce {
            assert!(!verify_nonce(&challenge, nonce).unwrap());
        }
    }

    #[test]
    fn test_harder_target() {
        let challenge = Challenge::new(
            "VXMwW2qPfW2gkCNSl1i708NJkDghtAyU",
            "0000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        );
        assert_eq!(solve_quick(&challenge).unwrap().nonce, 17495);
    }

    #[test]
    fn test_max_target_accepts_zero() {
        let challenge = Challenge::new("abc", "ff".repeat(32));
        assert_eq!(solve_quick(&challenge).unwrap().to_string(), "abc:0");
    }

    #[test]
    fn test_uppercase_target_decodes() {
        let challenge = Challenge::new("abc", "FF".repeat(32));
        assert_eq!(challenge.target_bytes().unwrap(), [0xff; 32]);
    }

    #[test]
    fn test_invalid_targets() {
        for target in ["xyz", "00ff", "0".repeat(66).as_str()] {
            let challenge = Challenge::new("abc", target);
            assert!(matches!(
                solve_quick(&challenge),
                Err(SolverError::InvalidTarget(_))
            ));
        }
    }

    #[test]
    fn test_zero_target_times_out() {
        let challenge = Challenge::new("abc", "00".repeat(32));
        let result = solve(&challenge, Duration::ZERO, &CancellationToken::new());
        match result {
            Err(SolverError::Timeout { nonces, .. }) => assert_eq!(nonces, CHECK_INTERVAL),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_before_solution() {
        let challenge = Challenge::new("abc", "00".repeat(32));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            solve(&challenge, Duration::from_secs(60), &cancel),
            Err(SolverError::Cancelled)
        );
    }
}
