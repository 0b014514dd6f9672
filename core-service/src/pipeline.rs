//! # Pipeline
//!
//! Processes one track at a time, start to finish:
//!
//! ```text
//! read tags → find lyric file → (operator) → cleanse → lookup → (operator)
//!           → confirm → challenge / solve / publish → move files
//! ```
//!
//! Files are only touched once the publisher reports a completed state
//! (`Published` or already published). A cancelled or failed track leaves
//! the filesystem as it found it.

use bridge_traits::storage::FileMover;
use core_metadata::lrc::read_lyrics_file;
use core_metadata::matcher::{resolve_manual_path, validate_manual_path};
use core_metadata::{
    extract_lyrics, CleansedLyrics, Cleanser, LyricIndex, MatchResult, TagReader, TrackMetadata,
};
use core_publish::{
    Decision, LookupResult, LrclibClient, PublishError, PublishOutcome, Publisher,
};
use core_runtime::config::AppConfig;
use core_runtime::logging::file_label;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::disposition::{self, DispositionPlanner};
use crate::error::{Result, ServiceError};
use crate::provider::DecisionProvider;
use crate::summary::{RunSummary, TrackReport, TrackResult};
use crate::CoreDependencies;

/// Operator answers tolerated per track before it is skipped.
pub const MAX_SELECTION_ATTEMPTS: usize = 3;

/// Where the lyrics for a track come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LyricSource {
    File { path: PathBuf, raw: String },
    Instrumental,
}

impl LyricSource {
    fn path(&self) -> Option<&Path> {
        match self {
            LyricSource::File { path, .. } => Some(path),
            LyricSource::Instrumental => None,
        }
    }
}

enum Selection {
    Source(LyricSource),
    Skip(String),
}

pub struct Pipeline {
    config: AppConfig,
    tags: Arc<dyn TagReader>,
    files: Arc<dyn FileMover>,
    decisions: Arc<dyn DecisionProvider>,
    publisher: Publisher,
    cleanser: Cleanser,
    planner: DispositionPlanner,
    working_dir: PathBuf,
    home_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        deps: CoreDependencies,
        decisions: Arc<dyn DecisionProvider>,
    ) -> Self {
        let client = LrclibClient::new(deps.http_client, &config);
        let publisher = Publisher::new(client, &config);
        let planner = DispositionPlanner::from_config(&config);
        Self {
            tags: deps.tags,
            files: deps.files,
            decisions,
            publisher,
            cleanser: Cleanser::new(),
            planner,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            home_dir: dirs::home_dir(),
            config,
        }
    }

    /// Base directories for relative and `~` manual paths.
    pub fn with_dirs(mut self, working_dir: PathBuf, home_dir: Option<PathBuf>) -> Self {
        self.working_dir = working_dir;
        self.home_dir = home_dir;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Audio files to process, in path order.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut files = core_metadata::extractor::discover_audio_files(&self.config.tracks_dir)?;
        if let Some(single) = &self.config.single {
            files.retain(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy() == single.as_str())
                    .unwrap_or(false)
            });
            if files.is_empty() {
                warn!(file = %single, "Requested file not found under tracks directory");
            }
        }
        Ok(files)
    }

    /// Process every discovered track. Per-track failures are recorded and
    /// the run moves on; an operator abort or interrupt ends it early.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        let tracks = self.discover()?;
        info!(
            count = tracks.len(),
            dry_run = self.config.dry_run,
            "Starting run"
        );

        let mut summary = RunSummary::default();
        for path in tracks {
            if cancel.is_cancelled() {
                summary.aborted = true;
                break;
            }

            match self.process_track(&path, cancel).await {
                Ok(report) => {
                    info!("{}", report);
                    summary.record(report);
                }
                Err(ServiceError::Aborted) => {
                    warn!("Run aborted by operator");
                    summary.aborted = true;
                    break;
                }
                Err(ServiceError::Cancelled) => {
                    warn!(file = %file_label(&path), "Interrupted, no files moved for this track");
                    summary.aborted = true;
                    break;
                }
                Err(e) => {
                    error!(file = %file_label(&path), error = %e, "Track failed");
                    summary.record(TrackReport::new(
                        file_label(&path),
                        TrackResult::Failed {
                            reason: e.to_string(),
                            kind: crate::summary::FailureKind::Other,
                        },
                    ));
                }
            }
        }

        for warning in &summary.warnings {
            warn!("{}", warning);
        }
        info!(%summary, "Run finished");
        Ok(summary)
    }

    /// Take one audio file through the whole flow.
    ///
    /// Returns `Err` only for outcomes that end the run
    /// ([`ServiceError::Aborted`], [`ServiceError::Cancelled`]) or for
    /// failures outside a single track's control.
    pub async fn process_track(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<TrackReport> {
        let track = match self.tags.read(path).await {
            Ok(track) => track,
            Err(e) => {
                warn!(file = %file_label(path), error = %e, "Skipping track with unusable tags");
                return Ok(TrackReport::new(
                    file_label(path),
                    TrackResult::Skipped(e.to_string()),
                ));
            }
        };
        let label = track.to_string();
        info!(track = %label, duration = track.duration_rounded(), "Processing track");

        let source = match self.select_lyrics(&track).await? {
            Selection::Source(source) => source,
            Selection::Skip(reason) => {
                info!(track = %label, reason = %reason, "Skipped");
                return Ok(TrackReport::new(label, TrackResult::Skipped(reason)));
            }
        };
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let lyrics = self.prepare_lyrics(&source);
        self.decisions
            .preview("Local lyrics", &lyrics, self.config.preview_lines)
            .await?;

        let outcome = match self.publish(&track, &lyrics, cancel).await {
            Ok(outcome) => outcome,
            Err(ServiceError::Publish(PublishError::Cancelled)) => {
                return Err(ServiceError::Cancelled)
            }
            Err(ServiceError::Publish(e)) => {
                error!(track = %label, error = %e, "Publish failed");
                return Ok(TrackReport::failed(label, &e));
            }
            Err(e) => return Err(e),
        };

        let result = match &outcome {
            PublishOutcome::Published(source) => TrackResult::Published(*source),
            PublishOutcome::AlreadyPublished(_) => TrackResult::AlreadyExisted,
            PublishOutcome::Skipped(reason) => TrackResult::Skipped(reason.clone()),
            PublishOutcome::DryRun(source) => TrackResult::Skipped(format!("dry run, {}", source)),
        };
        let mut report = TrackReport::new(label, result);

        if outcome.is_complete() {
            let write_back = (self.config.cleanse && !lyrics.instrumental)
                .then(|| format!("{}\n", lyrics.source_text()));
            let plan = self.planner.plan(&track, source.path(), write_back);
            if let Err(e) = disposition::apply(&plan, self.files.as_ref()).await {
                error!(track = %report.track, error = %e, "Could not move files");
                report.notes.push(format!("files not moved: {}", e));
            }
        }

        Ok(report)
    }

    fn prepare_lyrics(&self, source: &LyricSource) -> CleansedLyrics {
        match source {
            LyricSource::File { path, raw } if self.config.cleanse => {
                let (lyrics, stats) = self.cleanser.cleanse_with_stats(raw);
                debug!(file = %file_label(path), ?stats, "Cleansed lyrics");
                lyrics
            }
            LyricSource::File { raw, .. } => extract_lyrics(raw),
            LyricSource::Instrumental => CleansedLyrics::instrumental(),
        }
    }

    async fn select_lyrics(&self, track: &TrackMetadata) -> Result<Selection> {
        let index = LyricIndex::scan(&self.config.lrc_dir)?;
        let candidates = match index.match_track(track).await {
            MatchResult::SingleMatch(candidate) => {
                info!(file = %file_label(&candidate.path), "Matched lyric file");
                return Ok(Selection::Source(LyricSource::File {
                    path: candidate.path,
                    raw: candidate.raw_text,
                }));
            }
            MatchResult::MultipleMatches(candidates) => {
                info!(count = candidates.len(), "Several lyric files match");
                candidates
            }
            MatchResult::NoMatch => {
                info!(track = %track, "No lyric file matches");
                Vec::new()
            }
        };

        for attempt in 1..=MAX_SELECTION_ATTEMPTS {
            let decision = if candidates.is_empty() {
                self.decisions.on_missing_lyrics(track).await?
            } else {
                self.decisions.choose_candidate(track, &candidates).await?
            };
            debug!(attempt, decision = %decision, "Lyric selection");

            match decision {
                Decision::Pick(index) => match candidates.get(index) {
                    Some(candidate) => {
                        return Ok(Selection::Source(LyricSource::File {
                            path: candidate.path.clone(),
                            raw: candidate.raw_text.clone(),
                        }))
                    }
                    None => warn!(index, count = candidates.len(), "No such candidate"),
                },
                Decision::ManualPath(raw) => {
                    if let Some(source) = self.load_manual(&raw).await? {
                        return Ok(Selection::Source(source));
                    }
                }
                Decision::MarkInstrumental => {
                    return Ok(Selection::Source(LyricSource::Instrumental))
                }
                Decision::Skip => return Ok(Selection::Skip("no lyrics selected".to_string())),
                Decision::Abort => return Err(ServiceError::Aborted),
                other => warn!(decision = %other, "Not a lyric selection"),
            }
        }

        Ok(Selection::Skip(format!(
            "no usable lyric file after {} attempts",
            MAX_SELECTION_ATTEMPTS
        )))
    }

    /// `None` when the path is unusable or the operator backed out.
    async fn load_manual(&self, raw: &str) -> Result<Option<LyricSource>> {
        let path = match resolve_manual_path(raw, &self.working_dir, self.home_dir.as_deref()) {
            Ok(path) => path,
            Err(e) => {
                warn!(input = raw, error = %e, "Unusable path");
                return Ok(None);
            }
        };

        let is_lrc = match validate_manual_path(&path).await {
            Ok(is_lrc) => is_lrc,
            Err(e) => {
                warn!(error = %e, "Manual lyric path rejected");
                return Ok(None);
            }
        };
        if !is_lrc && !self.config.assume_yes && !self.decisions.confirm_extension(&path).await? {
            return Ok(None);
        }

        match read_lyrics_file(&path).await {
            Ok(raw) => Ok(Some(LyricSource::File { path, raw })),
            Err(e) => {
                warn!(file = %file_label(&path), error = %e, "Could not read lyric file");
                Ok(None)
            }
        }
    }

    async fn publish(
        &self,
        track: &TrackMetadata,
        lyrics: &CleansedLyrics,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome> {
        let mut session = self.publisher.begin(track);
        let preview_lines = self.config.preview_lines;

        match self.publisher.lookup(&mut session, cancel).await? {
            LookupResult::AlreadyPublished(record) => {
                self.decisions
                    .preview("Already published", &record.to_lyrics(), preview_lines)
                    .await?;
                return Ok(PublishOutcome::AlreadyPublished(record));
            }
            LookupResult::External(record) => {
                self.decisions
                    .preview("External lyrics", &record.to_lyrics(), preview_lines)
                    .await?;
                let decision = self.decisions.on_external_lyrics(track, &record).await?;
                if decision == Decision::Abort {
                    match self.publisher.resolve(&mut session, &decision) {
                        Err(PublishError::Cancelled) => {
                            debug!(state = session.state().as_str(), "Publish session aborted");
                        }
                        other => warn!(result = ?other, "Unexpected result resolving abort"),
                    }
                    return Err(ServiceError::Aborted);
                }
                if let Some(outcome) = self.publisher.resolve(&mut session, &decision)? {
                    return Ok(outcome);
                }
            }
            LookupResult::Missing => {}
        }

        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let (payload, source) = self.publisher.payload_for(&session, lyrics);
        let needs_confirmation = !self.config.assume_yes && !self.publisher.is_dry_run();
        if needs_confirmation
            && !self
                .decisions
                .confirm_publish(track, &payload, source)
                .await?
        {
            return Ok(self.publisher.skip(&mut session, "publish not confirmed")?);
        }

        Ok(self.publisher.submit(&mut session, lyrics, cancel).await?)
    }
}
