//! Pairing audio tracks with lyric files.
//!
//! Lyric files are found by a recursive scan for `*.lrc` and identified by
//! their file name, expected as `Artist - Title.lrc`. A candidate matches a
//! track when the normalized titles are equal and at least one artist is
//! shared.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{MetadataError, Result};
use crate::extractor::TrackMetadata;
use crate::lrc::read_lyrics_file;
use crate::normalize::{normalize_title, split_artists};

pub const LYRIC_EXTENSION: &str = "lrc";
const NAME_SEPARATOR: &str = " - ";

/// Lyric file located during a scan, with its file name already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedLyric {
    pub path: PathBuf,
    pub artists: Vec<String>,
    pub title: String,
    title_key: String,
    artist_keys: HashSet<String>,
}

impl IndexedLyric {
    /// `None` when the file name does not contain ` - `.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let (artists, title) = parse_lyric_filename(&path)?;
        let title_key = normalize_title(&title);
        if title_key.is_empty() {
            return None;
        }
        let artist_keys = artists.iter().map(|a| normalize_title(a)).collect();
        Some(Self {
            path,
            artists,
            title,
            title_key,
            artist_keys,
        })
    }

    pub fn matches(&self, track: &TrackMetadata) -> bool {
        if normalize_title(&track.title) != self.title_key {
            return false;
        }
        track
            .artists
            .iter()
            .any(|artist| self.artist_keys.contains(&normalize_title(artist)))
    }
}

/// A matched lyric file with its decoded contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricCandidate {
    pub path: PathBuf,
    pub artists: Vec<String>,
    pub title: String,
    pub raw_text: String,
}

/// Outcome of matching one track against the lyric pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    NoMatch,
    SingleMatch(LyricCandidate),
    /// In scan order.
    MultipleMatches(Vec<LyricCandidate>),
}

impl MatchResult {
    fn from_candidates(mut candidates: Vec<LyricCandidate>) -> Self {
        match candidates.len() {
            0 => MatchResult::NoMatch,
            1 => MatchResult::SingleMatch(candidates.remove(0)),
            _ => MatchResult::MultipleMatches(candidates),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MatchResult::NoMatch => 0,
            MatchResult::SingleMatch(_) => 1,
            MatchResult::MultipleMatches(all) => all.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every parseable lyric file under a root, in deterministic scan order.
#[derive(Debug, Clone, Default)]
pub struct LyricIndex {
    entries: Vec<IndexedLyric>,
}

impl LyricIndex {
    /// Recursively scan `root` for lyric files (extension match is
    /// case-insensitive). Entries are ordered by file name within each
    /// directory.
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(MetadataError::FileNotFound(root.display().to_string()));
        }

        let paths = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && has_lyric_extension(entry.path()))
            .map(|entry| entry.into_path());

        let index = Self::from_paths(paths);
        debug!(root = %root.display(), count = index.len(), "Indexed lyric files");
        Ok(index)
    }

    /// Build from an explicit list; unparseable names are skipped.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let entries = paths
            .into_iter()
            .filter_map(|path| {
                let indexed = IndexedLyric::from_path(path.clone());
                if indexed.is_none() {
                    debug!(path = %path.display(), "Lyric file name not in 'Artist - Title' form");
                }
                indexed
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching `track`, in scan order, without reading them.
    pub fn find(&self, track: &TrackMetadata) -> Vec<&IndexedLyric> {
        self.entries.iter().filter(|e| e.matches(track)).collect()
    }

    /// Match `track` and load the text of every matching file.
    ///
    /// Files that fail to read are logged and left out.
    pub async fn match_track(&self, track: &TrackMetadata) -> MatchResult {
        let mut candidates = Vec::new();
        for entry in self.find(track) {
            match read_lyrics_file(&entry.path).await {
                Ok(raw_text) => candidates.push(LyricCandidate {
                    path: entry.path.clone(),
                    artists: entry.artists.clone(),
                    title: entry.title.clone(),
                    raw_text,
                }),
                Err(e) => warn!(error = %e, "Skipping unreadable lyric file"),
            }
        }
        MatchResult::from_candidates(candidates)
    }
}

pub fn has_lyric_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(LYRIC_EXTENSION))
}

/// Split a lyric file stem on the first ` - ` into artists and title.
pub fn parse_lyric_filename(path: &Path) -> Option<(Vec<String>, String)> {
    let stem = path.file_stem()?.to_str()?;
    let (artist_part, title_part) = stem.split_once(NAME_SEPARATOR)?;
    Some((split_artists(artist_part), title_part.trim().to_string()))
}

/// Strip surrounding whitespace and matching quote pairs from user input.
pub fn strip_quotes(raw: &str) -> &str {
    let mut s = raw.trim();
    loop {
        let quoted = s.len() >= 2
            && ((s.starts_with('"') && s.ends_with('"'))
                || (s.starts_with('\'') && s.ends_with('\'')));
        if !quoted {
            return s;
        }
        s = s[1..s.len() - 1].trim();
    }
}

/// Turn operator input into an absolute path.
///
/// Accepts absolute paths, paths relative to `cwd`, `~` / `~/...` relative to
/// `home`, and quoted input with surrounding whitespace.
pub fn resolve_manual_path(raw: &str, cwd: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let cleaned = strip_quotes(raw);
    if cleaned.is_empty() {
        return Err(MetadataError::InvalidPath("empty path".to_string()));
    }

    let expanded = if cleaned == "~" {
        home.map(Path::to_path_buf)
            .ok_or_else(|| MetadataError::InvalidPath("home directory unknown".to_string()))?
    } else if let Some(rest) = cleaned
        .strip_prefix("~/")
        .or_else(|| cleaned.strip_prefix("~\\"))
    {
        home.map(|h| h.join(rest))
            .ok_or_else(|| MetadataError::InvalidPath("home directory unknown".to_string()))?
    } else {
        PathBuf::from(cleaned)
    };

    Ok(if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    })
}

/// Check that a manually supplied lyric path is an existing regular file.
///
/// Returns whether the file carries the `.lrc` extension; other extensions
/// are allowed but callers should confirm them.
pub async fn validate_manual_path(path: &Path) -> Result<bool> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| MetadataError::FileNotFound(path.display().to_string()))?;
    if !metadata.is_file() {
        return Err(MetadataError::InvalidPath(format!(
            "not a regular file: {}",
            path.display()
        )));
    }
    Ok(has_lyric_extension(path))
}
