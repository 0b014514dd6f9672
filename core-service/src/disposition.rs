//! Where a finished track's files go.
//!
//! [`DispositionPlanner::plan`] is pure and only describes the moves;
//! [`apply`] carries them out through a [`FileMover`]. Nothing here runs
//! unless the track reached a completed publish state.
//!
//! Rules:
//! - audio moves to `done_tracks_dir`, or stays put
//! - lyrics follow the audio when `follow_track` is set, otherwise move to
//!   `done_lrc_dir`, otherwise stay put
//! - `rename_lyrics` gives the lyric file the audio file's final stem
//! - name collisions get a `_dupN` suffix (mover policy)
//! - empty directories under the input roots are removed after a move

use bridge_traits::storage::FileMover;
use core_metadata::TrackMetadata;
use core_runtime::config::AppConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    InPlace,
    Directory(PathBuf),
    /// Same directory as the audio file after it has moved.
    BesideAudio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionPlan {
    pub audio: PathBuf,
    pub audio_destination: Destination,
    pub lyrics: Option<PathBuf>,
    pub lyrics_destination: Destination,
    pub rename_lyrics: bool,
    /// Written over the lyric file before it moves.
    pub write_back: Option<String>,
    pub cleanup_roots: Vec<PathBuf>,
}

impl DispositionPlan {
    /// Whether applying the plan can change any file location.
    pub fn moves_anything(&self) -> bool {
        let audio_moves = self.audio_destination != Destination::InPlace;
        let lyrics_move = self.lyrics.is_some()
            && (self.rename_lyrics
                || (self.lyrics_destination != Destination::InPlace
                    && !self.lyrics_follow_static_audio()));
        audio_moves || lyrics_move
    }

    // lyrics "beside" an audio file that stays in the same folder do not move
    fn lyrics_follow_static_audio(&self) -> bool {
        self.lyrics_destination == Destination::BesideAudio
            && self.audio_destination == Destination::InPlace
            && self.lyrics.as_deref().and_then(Path::parent) == self.audio.parent()
    }
}

#[derive(Debug, Clone)]
pub struct DispositionPlanner {
    done_tracks_dir: Option<PathBuf>,
    done_lrc_dir: Option<PathBuf>,
    follow_track: bool,
    rename_lyrics: bool,
    roots: Vec<PathBuf>,
}

impl DispositionPlanner {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut roots = vec![config.tracks_dir.clone()];
        if config.lrc_dir != config.tracks_dir {
            roots.push(config.lrc_dir.clone());
        }
        Self {
            done_tracks_dir: config.done_tracks_dir.clone(),
            done_lrc_dir: config.done_lrc_dir.clone(),
            follow_track: config.follow_track,
            rename_lyrics: config.rename_lyrics,
            roots,
        }
    }

    pub fn plan(
        &self,
        track: &TrackMetadata,
        lyrics: Option<&Path>,
        write_back: Option<String>,
    ) -> DispositionPlan {
        let audio_destination = match &self.done_tracks_dir {
            Some(dir) => Destination::Directory(dir.clone()),
            None => Destination::InPlace,
        };
        let lyrics_destination = if self.follow_track {
            Destination::BesideAudio
        } else {
            match &self.done_lrc_dir {
                Some(dir) => Destination::Directory(dir.clone()),
                None => Destination::InPlace,
            }
        };

        DispositionPlan {
            audio: track.path.clone(),
            audio_destination,
            lyrics: lyrics.map(Path::to_path_buf),
            lyrics_destination,
            rename_lyrics: self.rename_lyrics && lyrics.is_some(),
            write_back: lyrics.and(write_back),
            cleanup_roots: self.roots.clone(),
        }
    }
}

/// Final file locations after [`apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDisposition {
    pub audio: PathBuf,
    pub lyrics: Option<PathBuf>,
    pub removed_dirs: usize,
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

pub async fn apply(plan: &DispositionPlan, mover: &dyn FileMover) -> Result<AppliedDisposition> {
    if let (Some(lyrics), Some(text)) = (&plan.lyrics, &plan.write_back) {
        mover.write_text(lyrics, text).await?;
        debug!(path = %lyrics.display(), "Wrote cleansed lyrics back");
    }

    let audio = match &plan.audio_destination {
        Destination::Directory(dir) => mover.move_with_dedup(&plan.audio, dir, None).await?,
        Destination::InPlace | Destination::BesideAudio => plan.audio.clone(),
    };

    let lyrics = match &plan.lyrics {
        Some(src) => {
            let dir = match &plan.lyrics_destination {
                Destination::InPlace => parent_of(src),
                Destination::Directory(dir) => dir.clone(),
                Destination::BesideAudio => parent_of(&audio),
            };
            let stem = if plan.rename_lyrics {
                audio.file_stem().map(|s| s.to_string_lossy().into_owned())
            } else {
                None
            };

            if dir == parent_of(src) && stem.is_none() {
                Some(src.clone())
            } else {
                Some(mover.move_with_dedup(src, &dir, stem.as_deref()).await?)
            }
        }
        None => None,
    };

    let mut removed_dirs = 0;
    if plan.moves_anything() {
        for root in &plan.cleanup_roots {
            removed_dirs += mover.cleanup_empty_dirs(root).await?;
        }
    }

    info!(
        audio = %audio.display(),
        lyrics = ?lyrics.as_ref().map(|p| p.display().to_string()),
        removed_dirs,
        "Disposition applied"
    );
    Ok(AppliedDisposition {
        audio,
        lyrics,
        removed_dirs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use core_runtime::AppConfigBuilder;

    fn config(build: impl FnOnce(AppConfigBuilder) -> AppConfigBuilder) -> AppConfig {
        build(AppConfig::builder().tracks_dir("/in/tracks").lrc_dir("/in/lrc"))
            .build_with_env(|_| None)
            .unwrap()
    }

    fn track() -> TrackMetadata {
        TrackMetadata::new("/in/tracks/album/song.flac", "Song", "Alice", None, 10.0)
    }

    #[test]
    fn test_keep_in_place() {
        let planner = DispositionPlanner::from_config(&config(|b| b));
        let plan = planner.plan(&track(), Some(Path::new("/in/lrc/Alice - Song.lrc")), None);

        assert_eq!(plan.audio_destination, Destination::InPlace);
        assert_eq!(plan.lyrics_destination, Destination::InPlace);
        assert!(!plan.moves_anything());
        assert_eq!(
            plan.cleanup_roots,
            vec![PathBuf::from("/in/tracks"), PathBuf::from("/in/lrc")]
        );
    }

    #[test]
    fn test_done_directories() {
        let planner = DispositionPlanner::from_config(&config(|b| {
            b.done_tracks_dir("/done/tracks").done_lrc_dir("/done/lrc")
        }));
        let plan = planner.plan(&track(), Some(Path::new("/in/lrc/a.lrc")), Some("x".into()));

        assert_eq!(
            plan.audio_destination,
            Destination::Directory(PathBuf::from("/done/tracks"))
        );
        assert_eq!(
            plan.lyrics_destination,
            Destination::Directory(PathBuf::from("/done/lrc"))
        );
        assert_eq!(plan.write_back.as_deref(), Some("x"));
        assert!(plan.moves_anything());
    }

    #[test]
    fn test_follow_track_wins_over_lrc_dir() {
        let planner = DispositionPlanner::from_config(&config(|b| {
            b.done_tracks_dir("/done/tracks")
                .done_lrc_dir("/done/lrc")
                .follow_track(true)
        }));
        let plan = planner.plan(&track(), Some(Path::new("/in/lrc/a.lrc")), None);
        assert_eq!(plan.lyrics_destination, Destination::BesideAudio);
    }

    #[test]
    fn test_no_lyric_file() {
        let planner = DispositionPlanner::from_config(&config(|b| b.rename_lyrics(true)));
        let plan = planner.plan(&track(), None, Some("ignored".into()));
        assert!(plan.lyrics.is_none());
        assert!(!plan.rename_lyrics);
        assert!(plan.write_back.is_none());
    }

    #[test]
    fn test_follow_static_audio_in_same_dir_does_not_move() {
        let planner = DispositionPlanner::from_config(&config(|b| b.follow_track(true)));
        let plan = planner.plan(&track(), Some(Path::new("/in/tracks/album/a.lrc")), None);
        assert!(!plan.moves_anything());

        let plan = planner.plan(&track(), Some(Path::new("/in/lrc/a.lrc")), None);
        assert!(plan.moves_anything());
    }
}
