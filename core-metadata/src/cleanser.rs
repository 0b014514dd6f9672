//! Lyric standardization.
//!
//! [`Cleanser::cleanse`] runs a fixed sequence of passes over raw LRC text:
//!
//! 1. drop everything before the first timestamped line (ID tags included)
//! 2. drop credit lines (`作词：...`, `Composer: ...`)
//! 3. drop translation lines sharing a timestamp with a line of another script
//! 4. drop "instrumental, please enjoy" announcements
//! 5. normalize the text of every remaining line
//!
//! Lines are normalized before their timestamps are split off, so a
//! fullwidth `【00:01.00】` is read as a tag rather than left in the text.
//! Untimed lines after the first timestamp stay where they are; blank ones
//! become paragraph breaks in the plain text.
//!
//! The result is idempotent: cleansing [`CleansedLyrics::source_text`] again
//! yields the same value. Files without any timestamp are treated as plain
//! lyrics and skip the timestamp-dependent passes.
//!
//! The translation pass decides script by character majority
//! ([`is_cjk_dominant`]); mixed-script lines near 50% may be misjudged.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::lrc::{is_header_tag, normalize_line_endings, parse_line, LrcLine};
use crate::normalize::{is_cjk_dominant, normalize_text, normalize_title};

/// Credit labels, Simplified and Traditional Chinese, Japanese and English.
const CREDIT_LABELS: &[&str] = &[
    // zh-Hans
    "作词", "作曲", "编曲", "词", "曲", "混音", "缩混", "录音", "母带", "制作", "制作人",
    "监制", "和声", "和声编写", "配唱", "配唱制作", "出品", "企划", "统筹",
    // zh-Hant / ja
    "作詞", "編曲", "詞", "縮混", "錄音", "母帶", "製作", "製作人", "監製", "和聲",
    "ミックス", "マスタリング", "プロデューサー",
    // en
    "lyrics", "lyrics by", "lyricist", "written by", "words by", "composer", "composed by",
    "music by", "arranger", "arranged by", "arrangement", "mixer", "mixed by", "mixing",
    "mixing engineer", "mastering", "mastered by", "mastering engineer", "producer",
    "produced by", "executive producer", "vocal arrangement", "vocal arranger",
    "vocal producer", "recording", "recorded by", "recording engineer",
];

/// Instrumental announcements, compared after [`squash`].
const INSTRUMENTAL_PHRASES: &[&str] = &[
    "纯音乐请欣赏",
    "純音樂請欣賞",
    "纯音乐请您欣赏",
    "此歌曲为没有填词的纯音乐",
    "instrumentalpleaseenjoy",
];

static CREDIT_LINE: Lazy<Regex> = Lazy::new(|| {
    let mut labels: Vec<&str> = CREDIT_LABELS.to_vec();
    // longest first so `制作人` wins over `制作`
    labels.sort_by_key(|label| std::cmp::Reverse(label.chars().count()));
    let alternation = labels
        .iter()
        .map(|label| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)^(?:{})\s*[:：]", alternation)).expect("valid credit regex")
});

/// Output of the cleanser.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleansedLyrics {
    pub plain: String,
    pub synced: Option<String>,
    /// Both text fields are empty when set.
    pub instrumental: bool,
}

impl CleansedLyrics {
    pub fn instrumental() -> Self {
        Self {
            plain: String::new(),
            synced: None,
            instrumental: true,
        }
    }

    /// Text to feed back into the cleanser: synced if present, else plain.
    pub fn source_text(&self) -> &str {
        self.synced.as_deref().unwrap_or(&self.plain)
    }

    /// First `n` lines of the plain and synced text, for operator previews.
    pub fn preview(&self, n: usize) -> (Vec<&str>, Vec<&str>) {
        let plain = self.plain.lines().take(n).collect();
        let synced = self
            .synced
            .as_deref()
            .map(|s| s.lines().take(n).collect())
            .unwrap_or_default();
        (plain, synced)
    }
}

/// Per-pass removal counts, logged at debug level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanseStats {
    pub header_lines: usize,
    pub credit_lines: usize,
    pub translation_lines: usize,
    pub instrumental_lines: usize,
}

#[derive(Debug, Default, Clone)]
pub struct Cleanser;

impl Cleanser {
    pub fn new() -> Self {
        Self
    }

    pub fn cleanse(&self, raw: &str) -> CleansedLyrics {
        self.cleanse_with_stats(raw).0
    }

    pub fn cleanse_with_stats(&self, raw: &str) -> (CleansedLyrics, CleanseStats) {
        let mut stats = CleanseStats::default();
        let text = normalize_line_endings(raw);
        // pattern passes compare on the normalized form
        let parsed: Vec<LrcLine> = text
            .lines()
            .map(|line| parse_line(&normalize_text(line)))
            .collect();

        let total = parsed.len();
        let first_timed = parsed.iter().position(LrcLine::is_timed);
        let timed = first_timed.is_some();
        let mut lines: Vec<LrcLine> = parsed.into_iter().skip(first_timed.unwrap_or(0)).collect();
        lines.retain(|line| line.is_timed() || !is_header_tag(&line.text));
        stats.header_lines = total - lines.len();

        let before = lines.len();
        lines.retain(|line| !is_credit_line(&line.text));
        stats.credit_lines = before - lines.len();

        if timed {
            let before = lines.len();
            lines = drop_translations(lines);
            stats.translation_lines = before - lines.len();
        }

        let before = lines.len();
        lines.retain(|line| !is_instrumental_phrase(&line.text));
        stats.instrumental_lines = before - lines.len();

        // removals can make two runs of one timestamp adjacent
        if timed && stats.instrumental_lines > 0 {
            let before = lines.len();
            lines = drop_translations(lines);
            stats.translation_lines += before - lines.len();
        }

        if timed {
            trim_to_timed(&mut lines);
        }

        debug!(?stats, "Cleansed lyrics");

        if lines.iter().all(|line| line.text.is_empty()) {
            return (CleansedLyrics::instrumental(), stats);
        }

        let plain = trim_blank_edges(lines.iter().map(|line| line.text.as_str()).collect());
        let synced = timed.then(|| {
            lines
                .iter()
                .map(LrcLine::render)
                .collect::<Vec<_>>()
                .join("\n")
        });

        (
            CleansedLyrics {
                plain,
                synced,
                instrumental: false,
            },
            stats,
        )
    }
}

/// Split raw LRC text into plain and synced fields without cleansing.
///
/// ID tags stay in the synced text but never reach the plain text.
pub fn extract_lyrics(raw: &str) -> CleansedLyrics {
    let text = normalize_line_endings(raw);
    let timed = text.lines().any(|line| parse_line(line).is_timed());

    let texts: Vec<String> = text
        .lines()
        .filter(|line| !is_header_tag(line))
        .map(|line| parse_line(line).text)
        .collect();
    let plain = trim_blank_edges(texts.iter().map(String::as_str).collect());

    if plain.trim().is_empty() {
        return CleansedLyrics::instrumental();
    }

    CleansedLyrics {
        plain,
        synced: timed.then(|| text.trim().to_string()),
        instrumental: false,
    }
}

fn is_credit_line(text: &str) -> bool {
    CREDIT_LINE.is_match(text)
}

/// Lowercase and strip whitespace and punctuation.
fn squash(text: &str) -> String {
    normalize_title(text)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn is_instrumental_phrase(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let key = squash(text);
    INSTRUMENTAL_PHRASES.iter().any(|phrase| key.contains(phrase))
}

/// Within each run of lines sharing a timestamp, keep the first non-empty
/// line and any line of the same script; drop lines of the other script.
/// An untimed line ends the run.
fn drop_translations(lines: Vec<LrcLine>) -> Vec<LrcLine> {
    let mut result: Vec<LrcLine> = Vec::with_capacity(lines.len());
    let mut group: Option<String> = None;
    let mut retained_cjk: Option<bool> = None;

    for line in lines {
        if !line.is_timed() {
            group = None;
            retained_cjk = None;
            result.push(line);
            continue;
        }
        if group != line.timestamp {
            group = line.timestamp.clone();
            retained_cjk = None;
        }

        if line.text.is_empty() {
            result.push(line);
            continue;
        }

        let cjk = is_cjk_dominant(&line.text);
        match retained_cjk {
            None => {
                retained_cjk = Some(cjk);
                result.push(line);
            }
            Some(kept) if kept == cjk => result.push(line),
            Some(_) => {}
        }
    }
    result
}

/// Output starts at a timestamped line and ends without blank lines, so the
/// header pass finds nothing to drop on a second run.
fn trim_to_timed(lines: &mut Vec<LrcLine>) {
    let start = lines.iter().position(LrcLine::is_timed).unwrap_or(lines.len());
    lines.drain(..start);
    while lines
        .last()
        .is_some_and(|line| !line.is_timed() && line.text.is_empty())
    {
        lines.pop();
    }
}

fn trim_blank_edges(lines: Vec<&str>) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}
