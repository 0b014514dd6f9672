//! Per-track results and the end-of-run summary.

use core_publish::{PayloadSource, PublishError};
use std::fmt;

/// Consecutive transport failures that earn a run-level warning.
pub const TRANSPORT_STREAK_WARNING: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retries exhausted on connection errors or timeouts.
    Transport,
    /// Solver timed out or was interrupted.
    Solver,
    /// Challenge target could not be used at all.
    SolverConfig,
    /// The service refused the request (4xx).
    Rejected,
    Other,
}

impl FailureKind {
    pub fn from_error(err: &PublishError) -> Self {
        match err {
            e if e.is_transport_exhaustion() => FailureKind::Transport,
            PublishError::Solver(e) if e.is_configuration_error() => FailureKind::SolverConfig,
            PublishError::Solver(_) => FailureKind::Solver,
            PublishError::ClientError { .. } => FailureKind::Rejected,
            _ => FailureKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackResult {
    Published(PayloadSource),
    AlreadyExisted,
    Skipped(String),
    Failed { reason: String, kind: FailureKind },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReport {
    /// `artist - title`, or the file name when tags could not be read.
    pub track: String,
    pub result: TrackResult,
    /// Problems that did not change the result, such as a failed move.
    pub notes: Vec<String>,
}

impl TrackReport {
    pub fn new(track: impl Into<String>, result: TrackResult) -> Self {
        Self {
            track: track.into(),
            result,
            notes: Vec::new(),
        }
    }

    pub fn failed(track: impl Into<String>, err: &PublishError) -> Self {
        Self::new(
            track,
            TrackResult::Failed {
                reason: err.to_string(),
                kind: FailureKind::from_error(err),
            },
        )
    }
}

impl fmt::Display for TrackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            TrackResult::Published(source) => write!(f, "{}: published ({})", self.track, source),
            TrackResult::AlreadyExisted => write!(f, "{}: already published", self.track),
            TrackResult::Skipped(reason) => write!(f, "{}: skipped ({})", self.track, reason),
            TrackResult::Failed { reason, .. } => write!(f, "{}: failed ({})", self.track, reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub published: usize,
    pub already_existed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub warnings: Vec<String>,
    pub reports: Vec<TrackReport>,
    /// The run stopped early (operator abort or interrupt).
    pub aborted: bool,
    transport_streak: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: TrackReport) {
        match &report.result {
            TrackResult::Published(_) => self.published += 1,
            TrackResult::AlreadyExisted => self.already_existed += 1,
            TrackResult::Skipped(_) => self.skipped += 1,
            TrackResult::Failed { .. } => self.failed += 1,
        }

        match &report.result {
            TrackResult::Failed {
                kind: FailureKind::Transport,
                ..
            } => {
                self.transport_streak += 1;
                if self.transport_streak == TRANSPORT_STREAK_WARNING {
                    self.warnings.push(format!(
                        "{} tracks in a row failed on network errors; check connectivity",
                        TRANSPORT_STREAK_WARNING
                    ));
                }
            }
            TrackResult::Failed {
                kind: FailureKind::SolverConfig,
                reason,
            } => {
                self.transport_streak = 0;
                self.warnings
                    .push(format!("Solver configuration error on {}: {}", report.track, reason));
            }
            _ => self.transport_streak = 0,
        }

        for note in &report.notes {
            self.warnings.push(format!("{}: {}", report.track, note));
        }
        self.reports.push(report);
    }

    pub fn total(&self) -> usize {
        self.published + self.already_existed + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "published: {}, already existed: {}, skipped: {}, failed: {}",
            self.published, self.already_existed, self.skipped, self.failed
        )?;
        if self.aborted {
            f.write_str(" (run stopped early)")?;
        }
        Ok(())
    }
}
