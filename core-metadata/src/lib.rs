//! # Metadata & Lyrics Module
//!
//! Everything that happens to a track before it reaches the network:
//! - Audio tag extraction ([`extractor`])
//! - Text normalization and artist splitting ([`normalize`])
//! - LRC parsing and lyric file decoding ([`lrc`])
//! - Track to lyric file matching ([`matcher`])
//! - Lyric cleansing ([`cleanser`])

pub mod cleanser;
pub mod error;
pub mod extractor;
pub mod lrc;
pub mod matcher;
pub mod normalize;

pub use cleanser::{extract_lyrics, CleansedLyrics, Cleanser};
pub use error::{MetadataError, Result};
pub use extractor::{MetadataExtractor, TagReader, TrackMetadata};
pub use matcher::{LyricCandidate, LyricIndex, MatchResult};
