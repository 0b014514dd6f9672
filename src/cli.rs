//! Command-line surface. Every option is optional so that unset values
//! fall through to `LRCUP_*` environment variables and then to defaults.

use clap::Parser;
use core_runtime::config::{AppConfig, InstrumentalPayload};
use core_runtime::logging::{LogFormat, LogLevel, LoggingConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lrcup")]
#[command(version, about = "Match local lyric files to audio tracks and publish them to LRCLIB", long_about = None)]
pub struct Cli {
    /// Directory scanned for audio files
    #[arg(short, long, value_name = "DIR")]
    pub tracks_dir: Option<PathBuf>,

    /// Directory scanned for lyric files (defaults to the tracks directory)
    #[arg(short, long, value_name = "DIR")]
    pub lrc_dir: Option<PathBuf>,

    /// Move finished audio files here
    #[arg(long, value_name = "DIR")]
    pub done_tracks_dir: Option<PathBuf>,

    /// Move finished lyric files here
    #[arg(long, value_name = "DIR")]
    pub done_lrc_dir: Option<PathBuf>,

    /// Put the lyric file next to the audio file after it moves
    #[arg(short, long)]
    pub follow: bool,

    /// Rename the lyric file to match the audio file
    #[arg(short, long)]
    pub rename: bool,

    /// Standardize lyrics before publishing and write them back
    #[arg(short, long)]
    pub cleanse: bool,

    /// Lines shown in lyric previews
    #[arg(long, value_name = "N")]
    pub preview_lines: Option<usize>,

    /// Attempts per request, first try included
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// LRCLIB API base URL
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Give up on a proof-of-work challenge after this many seconds
    #[arg(long, value_name = "SECS")]
    pub solver_timeout: Option<u64>,

    /// How instrumental tracks are published: omit or empty
    #[arg(long, value_name = "MODE")]
    pub instrumental_payload: Option<InstrumentalPayload>,

    /// Publish without asking for confirmation
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,

    /// Look everything up but publish and move nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Only process the audio file with this name
    #[arg(short, long, value_name = "FILE")]
    pub single: Option<String>,

    /// trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,

    /// compact, pretty or json
    #[arg(long, default_value = "compact")]
    pub log_format: LogFormat,

    /// Custom filter directives, e.g. "core_publish=trace"
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> core_runtime::Result<AppConfig> {
        self.into_config_with_env(|key| std::env::var(key).ok())
    }

    pub fn into_config_with_env<F>(self, env: F) -> core_runtime::Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut logging = LoggingConfig::default()
            .with_level(self.log_level)
            .with_format(self.log_format);
        if let Some(filter) = self.log_filter {
            logging = logging.with_filter(filter);
        }

        let mut builder = AppConfig::builder()
            .follow_track(self.follow)
            .rename_lyrics(self.rename)
            .cleanse(self.cleanse)
            .assume_yes(self.assume_yes)
            .dry_run(self.dry_run)
            .logging(logging);

        if let Some(dir) = self.tracks_dir {
            builder = builder.tracks_dir(dir);
        }
        if let Some(dir) = self.lrc_dir {
            builder = builder.lrc_dir(dir);
        }
        if let Some(dir) = self.done_tracks_dir {
            builder = builder.done_tracks_dir(dir);
        }
        if let Some(dir) = self.done_lrc_dir {
            builder = builder.done_lrc_dir(dir);
        }
        if let Some(lines) = self.preview_lines {
            builder = builder.preview_lines(lines);
        }
        if let Some(attempts) = self.max_retries {
            builder = builder.max_attempts(attempts);
        }
        if let Some(base) = self.api_base {
            builder = builder.api_base(base);
        }
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        if let Some(secs) = self.solver_timeout {
            builder = builder.solver_timeout(Duration::from_secs(secs));
        }
        if let Some(mode) = self.instrumental_payload {
            builder = builder.instrumental_payload(mode);
        }
        if let Some(single) = self.single {
            builder = builder.single(single);
        }

        builder.build_with_env(env)
    }
}
