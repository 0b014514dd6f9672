//! Wire types for the LRCLIB API.

use core_metadata::{CleansedLyrics, TrackMetadata};
pub use core_runtime::config::InstrumentalPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lookup key for `/get` and `/get-cached`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    /// Whole seconds.
    pub duration: u64,
}

impl LyricsQuery {
    pub fn from_track(track: &TrackMetadata) -> Self {
        Self {
            track_name: track.title.clone(),
            artist_name: track.artist_credit.clone(),
            album_name: track.album_or_empty().to_string(),
            duration: track.duration_rounded(),
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("track_name", self.track_name.clone()),
            ("artist_name", self.artist_name.clone()),
            ("album_name", self.album_name.clone()),
            ("duration", self.duration.to_string()),
        ]
    }
}

impl fmt::Display for LyricsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} [{}] ({}s)",
            self.artist_name, self.track_name, self.album_name, self.duration
        )
    }
}

/// Raw record as returned by the service. Every field may be missing or null.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRecord {
    pub id: Option<i64>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    pub duration: Option<f64>,
    pub instrumental: Option<bool>,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
}

/// Lyrics record held by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsRecord {
    pub id: Option<i64>,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub duration: Option<f64>,
    pub plain_lyrics: String,
    pub synced_lyrics: String,
    pub instrumental: bool,
}

impl LyricsRecord {
    /// A record with no text at all counts as instrumental even when the
    /// flag is unset.
    pub fn from_api(raw: ApiRecord) -> Self {
        let plain_lyrics = raw.plain_lyrics.unwrap_or_default();
        let synced_lyrics = raw.synced_lyrics.unwrap_or_default();
        let instrumental = raw.instrumental.unwrap_or(false)
            || (plain_lyrics.trim().is_empty() && synced_lyrics.trim().is_empty());

        Self {
            id: raw.id,
            track_name: raw.track_name.unwrap_or_default(),
            artist_name: raw.artist_name.unwrap_or_default(),
            album_name: raw.album_name.unwrap_or_default(),
            duration: raw.duration,
            plain_lyrics,
            synced_lyrics,
            instrumental,
        }
    }

    /// Convert to the shape produced by the cleanser, for previews and
    /// for publishing the record as-is.
    pub fn to_lyrics(&self) -> CleansedLyrics {
        if self.instrumental {
            return CleansedLyrics::instrumental();
        }
        CleansedLyrics {
            plain: self.plain_lyrics.clone(),
            synced: (!self.synced_lyrics.trim().is_empty()).then(|| self.synced_lyrics.clone()),
            instrumental: false,
        }
    }
}

/// Where the published lyrics came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Local,
    External,
    Instrumental,
}

impl PayloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadSource::Local => "local",
            PayloadSource::External => "external",
            PayloadSource::Instrumental => "instrumental",
        }
    }
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /publish`.
///
/// Lyric fields are either both present or both absent. Instrumental
/// payloads omit them or send empty strings, depending on
/// [`InstrumentalPayload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPayload {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain_lyrics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_lyrics: Option<String>,
}

impl PublishPayload {
    pub fn new(query: &LyricsQuery, lyrics: &CleansedLyrics, mode: InstrumentalPayload) -> Self {
        let (plain_lyrics, synced_lyrics) = if lyrics.instrumental {
            match mode {
                InstrumentalPayload::Omit => (None, None),
                InstrumentalPayload::EmptyStrings => (Some(String::new()), Some(String::new())),
            }
        } else {
            (
                Some(lyrics.plain.clone()),
                Some(lyrics.synced.clone().unwrap_or_default()),
            )
        };

        Self {
            track_name: query.track_name.clone(),
            artist_name: query.artist_name.clone(),
            album_name: query.album_name.clone(),
            duration: query.duration,
            plain_lyrics,
            synced_lyrics,
        }
    }

    pub fn is_instrumental(&self) -> bool {
        self.plain_lyrics.as_deref().unwrap_or("").is_empty()
            && self.synced_lyrics.as_deref().unwrap_or("").is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn query() -> LyricsQuery {
        let track = TrackMetadata::new(
            "/music/a.flac",
            "Song",
            "Alice & Bob",
            Some("Album".into()),
            212.6,
        );
        LyricsQuery::from_track(&track)
    }

    #[test]
    fn test_query_from_track() {
        let q = query();
        assert_eq!(q.artist_name, "Alice & Bob");
        assert_eq!(q.duration, 213);
        assert_eq!(
            q.to_query_pairs(),
            vec![
                ("track_name", "Song".to_string()),
                ("artist_name", "Alice & Bob".to_string()),
                ("album_name", "Album".to_string()),
                ("duration", "213".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_album_is_empty_string() {
        let track = TrackMetadata::new("/a.mp3", "Song", "Alice", None, 10.0);
        assert_eq!(LyricsQuery::from_track(&track).album_name, "");
    }

    #[test]
    fn test_record_from_api() {
        let raw: ApiRecord = serde_json::from_value(json!({
            "id": 42,
            "trackName": "Song",
            "artistName": "Alice",
            "albumName": "Album",
            "duration": 213.0,
            "instrumental": false,
            "plainLyrics": "hello",
            "syncedLyrics": "[00:01.00]hello"
        }))
        .unwrap();
        let record = LyricsRecord::from_api(raw);

        assert_eq!(record.id, Some(42));
        assert!(!record.instrumental);
        assert_eq!(record.to_lyrics().synced.as_deref(), Some("[00:01.00]hello"));
    }

    #[test]
    fn test_record_without_text_is_instrumental() {
        let raw: ApiRecord = serde_json::from_value(json!({
            "trackName": "Song",
            "plainLyrics": null,
            "syncedLyrics": ""
        }))
        .unwrap();
        let record = LyricsRecord::from_api(raw);
        assert!(record.instrumental);
        assert_eq!(record.to_lyrics(), CleansedLyrics::instrumental());
    }

    #[test]
    fn test_payload_with_lyrics() {
        let lyrics = CleansedLyrics {
            plain: "hello".into(),
            synced: Some("[00:01.00]hello".into()),
            instrumental: false,
        };
        let payload = PublishPayload::new(&query(), &lyrics, InstrumentalPayload::Omit);
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            value,
            json!({
                "trackName": "Song",
                "artistName": "Alice & Bob",
                "albumName": "Album",
                "duration": 213,
                "plainLyrics": "hello",
                "syncedLyrics": "[00:01.00]hello"
            })
        );
    }

    #[test]
    fn test_plain_only_lyrics_send_empty_synced() {
        let lyrics = CleansedLyrics {
            plain: "hello".into(),
            synced: None,
            instrumental: false,
        };
        let payload = PublishPayload::new(&query(), &lyrics, InstrumentalPayload::Omit);
        assert_eq!(payload.synced_lyrics.as_deref(), Some(""));
        assert!(!payload.is_instrumental());
    }

    #[test]
    fn test_instrumental_payload_modes() {
        let lyrics = CleansedLyrics::instrumental();

        let omitted = PublishPayload::new(&query(), &lyrics, InstrumentalPayload::Omit);
        let value = serde_json::to_value(&omitted).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("plainLyrics"));
        assert!(!object.contains_key("syncedLyrics"));
        assert!(omitted.is_instrumental());

        let empty = PublishPayload::new(&query(), &lyrics, InstrumentalPayload::EmptyStrings);
        let value = serde_json::to_value(&empty).unwrap();
        assert_eq!(value["plainLyrics"], Value::String(String::new()));
        assert_eq!(value["syncedLyrics"], Value::String(String::new()));
        assert!(empty.is_instrumental());
    }
}
