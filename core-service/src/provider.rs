//! Decision points of the pipeline.
//!
//! The pipeline never reads input itself. Every question it needs answered
//! goes through a [`DecisionProvider`], so the same flow runs behind a
//! terminal prompt or a scripted test double.

use async_trait::async_trait;
use core_metadata::{CleansedLyrics, LyricCandidate, TrackMetadata};
use core_publish::{Decision, LyricsRecord, PayloadSource, PublishPayload};
use std::path::Path;

use crate::error::Result;

#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Several lyric files matched. Expected answers: `Pick`, `ManualPath`,
    /// `MarkInstrumental`, `Skip` or `Abort`.
    async fn choose_candidate(
        &self,
        track: &TrackMetadata,
        candidates: &[LyricCandidate],
    ) -> Result<Decision>;

    /// No lyric file matched. Expected answers: `ManualPath`,
    /// `MarkInstrumental`, `Skip` or `Abort`.
    async fn on_missing_lyrics(&self, track: &TrackMetadata) -> Result<Decision>;

    /// The service found lyrics elsewhere. Expected answers: `UseExternal`,
    /// `UseLocal`, `Skip` or `Abort`.
    async fn on_external_lyrics(
        &self,
        track: &TrackMetadata,
        external: &LyricsRecord,
    ) -> Result<Decision>;

    /// Last chance to back out before the upload.
    async fn confirm_publish(
        &self,
        track: &TrackMetadata,
        payload: &PublishPayload,
        source: PayloadSource,
    ) -> Result<bool>;

    /// A manually chosen file does not end in `.lrc`.
    async fn confirm_extension(&self, path: &Path) -> Result<bool>;

    /// Show the first `lines` lines of `lyrics` under `heading`.
    async fn preview(&self, heading: &str, lyrics: &CleansedLyrics, lines: usize) -> Result<()>;
}
