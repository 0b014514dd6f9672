//! Audio Tag Extraction
//!
//! Reads title, artist, album and duration with the `lofty` crate (ID3v2,
//! Vorbis Comments, MP4 atoms, APE, ...). The rest of the workspace only sees
//! [`TrackMetadata`] through the [`TagReader`] trait.
//!
//! ```ignore
//! use core_metadata::extractor::{MetadataExtractor, TagReader};
//!
//! let extractor = MetadataExtractor::new();
//! let track = extractor.read(Path::new("song.flac")).await?;
//! println!("{} ({}s)", track, track.duration_rounded());
//! ```

use async_trait::async_trait;
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{MetadataError, Result};
use crate::normalize::split_artists;

/// Extensions picked up when scanning for audio files (lowercase).
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "mp4", "ogg", "opus", "wav", "aac", "wma", "ape", "aiff",
];

/// Tag data for one audio file. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub path: PathBuf,
    pub title: String,
    /// Artist credit exactly as tagged, sent to the lyrics service.
    pub artist_credit: String,
    /// Individual artists in tag order, used for matching.
    pub artists: Vec<String>,
    pub album: Option<String>,
    /// Seconds, possibly fractional.
    pub duration_secs: f64,
}

impl TrackMetadata {
    pub fn new(
        path: impl Into<PathBuf>,
        title: impl Into<String>,
        artist_credit: impl Into<String>,
        album: Option<String>,
        duration_secs: f64,
    ) -> Self {
        let artist_credit = artist_credit.into();
        Self {
            path: path.into(),
            title: title.into(),
            artists: split_artists(&artist_credit),
            artist_credit,
            album,
            duration_secs,
        }
    }

    /// Duration rounded to whole seconds, as the lyrics service expects.
    pub fn duration_rounded(&self) -> u64 {
        self.duration_secs.round().max(0.0) as u64
    }

    pub fn album_or_empty(&self) -> &str {
        self.album.as_deref().unwrap_or("")
    }

    /// File stem of the audio file, used when renaming lyrics.
    pub fn file_stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    }
}

impl fmt::Display for TrackMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist_credit, self.title)
    }
}

/// Source of [`TrackMetadata`].
#[async_trait]
pub trait TagReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<TrackMetadata>;
}

/// Lofty-backed tag reader.
pub struct MetadataExtractor {
    parse_options: ParseOptions,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    /// Read tags from `path`.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::FileNotFound`] / [`MetadataError::ExtractionFailed`]
    ///   when the file cannot be read or parsed
    /// - [`MetadataError::IncompleteTags`] when title, artist or a positive
    ///   duration is missing
    pub async fn extract_from_file(&self, path: &Path) -> Result<TrackMetadata> {
        debug!("Extracting metadata from: {}", path.display());

        let file_data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MetadataError::FileNotFound(path.display().to_string())
            } else {
                MetadataError::ExtractionFailed(format!("Failed to read file: {}", e))
            }
        })?;

        // lofty parsing is synchronous and can be slow on large files
        let parse_options = self.parse_options;
        let tagged_file = tokio::task::spawn_blocking(move || {
            Probe::new(std::io::Cursor::new(file_data))
                .options(parse_options)
                .guess_file_type()
                .map_err(|e| {
                    MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e))
                })?
                .read()
                .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {}", e)))
        })
        .await
        .map_err(|e| MetadataError::ExtractionFailed(format!("Tag parsing task failed: {}", e)))??;

        let duration_secs = tagged_file.properties().duration().as_secs_f64();

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .ok_or_else(|| {
                warn!("No tags found in file: {}", path.display());
                MetadataError::IncompleteTags(format!("no tags in {}", path.display()))
            })?;

        let title = tag.title().map(|s| s.trim().to_string());
        let artist = tag
            .artist()
            .map(|s| s.trim().to_string())
            .or_else(|| tag.get_string(&ItemKey::AlbumArtist).map(|s| s.trim().to_string()));
        let album = tag
            .album()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self::assemble(path, title, artist, album, duration_secs)
    }

    /// Validate raw tag values and build the metadata record.
    fn assemble(
        path: &Path,
        title: Option<String>,
        artist: Option<String>,
        album: Option<String>,
        duration_secs: f64,
    ) -> Result<TrackMetadata> {
        let title = title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MetadataError::IncompleteTags(format!("missing title: {}", path.display())))?;
        let artist = artist
            .filter(|a| !a.is_empty())
            .ok_or_else(|| MetadataError::IncompleteTags(format!("missing artist: {}", path.display())))?;
        if duration_secs.is_nan() || duration_secs <= 0.0 {
            return Err(MetadataError::IncompleteTags(format!(
                "invalid duration: {}",
                path.display()
            )));
        }

        Ok(TrackMetadata::new(path, title, artist, album, duration_secs))
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagReader for MetadataExtractor {
    async fn read(&self, path: &Path) -> Result<TrackMetadata> {
        self.extract_from_file(path).await
    }
}

/// Whether `path` has one of [`SUPPORTED_AUDIO_EXTENSIONS`].
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively list audio files under `root`, sorted by path.
pub fn discover_audio_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(MetadataError::FileNotFound(root.display().to_string()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    debug!(root = %root.display(), count = files.len(), "Discovered audio files");
    Ok(files)
}
