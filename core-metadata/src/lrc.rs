//! LRC line parsing and lyric file decoding.

use encoding_rs::GB18030;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use crate::error::{MetadataError, Result};

/// One or more leading timestamps: `[mm:ss]`, `[mm:ss.xx]`, `[mm:ss.xxx-1]`,
/// possibly separated by whitespace.
static TIMESTAMP_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\[\d{1,3}:\d{2}(?:[.:]\d{1,3})?(?:-\d{1,3})?\]\s*)+)(.*)$")
        .expect("valid timestamp regex")
});

static TIMESTAMP_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid timestamp tag regex"));

/// ID tags such as `[ar:Artist]`, `[ti:Title]`, `[offset:+100]`.
static HEADER_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[[a-zA-Z#]{1,8}:.*\]$").expect("valid header regex"));

/// A single LRC line split into its timestamp prefix and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrcLine {
    /// Timestamp prefix with stacked tags joined, e.g. `[00:10.00][00:50.00]`.
    pub timestamp: Option<String>,
    pub text: String,
}

impl LrcLine {
    pub fn is_timed(&self) -> bool {
        self.timestamp.is_some()
    }

    /// Render back to `[ts]text` (or bare text for untimed lines).
    pub fn render(&self) -> String {
        match &self.timestamp {
            Some(ts) => format!("{}{}", ts, self.text),
            None => self.text.clone(),
        }
    }
}

/// Split one line into timestamp prefix and trimmed text.
///
/// Every leading tag goes into the prefix, so the text never starts with a
/// timestamp and `parse_line(&line.render()) == line`.
pub fn parse_line(line: &str) -> LrcLine {
    let line = line.trim();
    match TIMESTAMP_PREFIX.captures(line) {
        Some(caps) => LrcLine {
            timestamp: caps.get(1).map(|m| {
                TIMESTAMP_TAG
                    .find_iter(m.as_str())
                    .map(|tag| tag.as_str())
                    .collect::<String>()
            }),
            text: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
        },
        None => LrcLine {
            timestamp: None,
            text: line.to_string(),
        },
    }
}

/// Whether `line` is an LRC ID tag rather than lyric text.
pub fn is_header_tag(line: &str) -> bool {
    let line = line.trim();
    HEADER_TAG.is_match(line) && !TIMESTAMP_PREFIX.is_match(line)
}

/// Convert `\r\n` and bare `\r` line endings to `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Decode lyric bytes: UTF-8 (BOM stripped), then GB18030, then lossy UTF-8.
pub fn decode_lyrics(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    if let Some(text) = GB18030.decode_without_bom_handling_and_without_replacement(bytes) {
        debug!("Decoded lyrics as GB18030");
        return text.into_owned();
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// Read and decode a lyric file.
pub async fn read_lyrics_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        MetadataError::LyricsReadFailed(format!("{}: {}", path.display(), e))
    })?;
    Ok(decode_lyrics(&bytes))
}
