//! # Application Configuration
//!
//! One immutable [`AppConfig`] is resolved at startup and passed by reference
//! into the pipeline.
//!
//! ## Layering
//!
//! Values set on the [`AppConfigBuilder`] (normally from CLI flags) win over
//! `LRCUP_*` environment variables, which win over built-in defaults. The
//! environment lookup is injected, so tests never touch the process
//! environment.
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//!
//! let config = AppConfig::builder()
//!     .tracks_dir("/music/inbox")
//!     .done_tracks_dir("/music/library")
//!     .cleanse(true)
//!     .build()?;
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};

pub const ENV_TRACKS_DIR: &str = "LRCUP_TRACKS_DIR";
pub const ENV_LRC_DIR: &str = "LRCUP_LRC_DIR";
pub const ENV_DONE_TRACKS_DIR: &str = "LRCUP_DONE_TRACKS_DIR";
pub const ENV_DONE_LRC_DIR: &str = "LRCUP_DONE_LRC_DIR";
pub const ENV_PREVIEW_LINES: &str = "LRCUP_PREVIEW_LINES";
pub const ENV_MAX_HTTP_RETRIES: &str = "LRCUP_MAX_HTTP_RETRIES";
pub const ENV_USER_AGENT: &str = "LRCUP_USER_AGENT";
pub const ENV_API_BASE: &str = "LRCUP_API_BASE";
pub const ENV_SOLVER_TIMEOUT_SECS: &str = "LRCUP_SOLVER_TIMEOUT_SECS";
pub const ENV_INSTRUMENTAL_PAYLOAD: &str = "LRCUP_INSTRUMENTAL_PAYLOAD";

pub const DEFAULT_API_BASE: &str = "https://lrclib.net/api";
pub const DEFAULT_PREVIEW_LINES: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(300);

pub fn default_user_agent() -> String {
    format!(
        "lrcup/{} (https://github.com/lrcup/lrcup)",
        env!("CARGO_PKG_VERSION")
    )
}

/// How an instrumental track is encoded in the publish payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstrumentalPayload {
    /// Leave `plainLyrics` and `syncedLyrics` out of the JSON body.
    #[default]
    Omit,
    /// Send both fields as empty strings.
    EmptyStrings,
}

impl FromStr for InstrumentalPayload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "omit" => Ok(Self::Omit),
            "empty" | "empty-strings" => Ok(Self::EmptyStrings),
            other => Err(Error::Config(format!(
                "Unknown instrumental payload mode: {} (expected omit or empty)",
                other
            ))),
        }
    }
}

/// Backoff knobs for network calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Total attempts per call, first try included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Each delay is scaled by a random factor in `1 ± jitter_ratio`.
    pub jitter_ratio: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_ratio: 0.1,
        }
    }
}

/// Resolved run configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tracks_dir: PathBuf,
    pub lrc_dir: PathBuf,
    pub done_tracks_dir: Option<PathBuf>,
    pub done_lrc_dir: Option<PathBuf>,
    /// Lyric file is moved next to the finished audio file.
    pub follow_track: bool,
    /// Lyric file is renamed to the audio file's stem.
    pub rename_lyrics: bool,
    pub cleanse: bool,
    pub preview_lines: usize,
    pub api_base: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub retry: RetrySettings,
    pub solver_timeout: Duration,
    pub instrumental_payload: InstrumentalPayload,
    pub assume_yes: bool,
    pub dry_run: bool,
    /// Only process the audio file with this name.
    pub single: Option<String>,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Files are left where they are when no destination is configured.
    pub fn keep_in_place(&self) -> bool {
        self.done_tracks_dir.is_none() && self.done_lrc_dir.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracks_dir.as_os_str().is_empty() {
            return Err(Error::Config("Tracks directory cannot be empty".to_string()));
        }
        if self.preview_lines == 0 {
            return Err(Error::Config(
                "Preview lines must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "Retry attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.retry.jitter_ratio) {
            return Err(Error::Config(format!(
                "Jitter ratio must be in [0, 1), got {}",
                self.retry.jitter_ratio
            )));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(Error::Config(
                "Retry base delay exceeds the maximum delay".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.solver_timeout.is_zero() {
            return Err(Error::Config("Timeouts must be non-zero".to_string()));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(Error::Config(format!(
                "API base must be an http(s) URL, got {}",
                self.api_base
            )));
        }
        Ok(())
    }
}

/// Builder for [`AppConfig`]. Unset fields fall through to env, then defaults.
#[derive(Debug, Default, Clone)]
pub struct AppConfigBuilder {
    tracks_dir: Option<PathBuf>,
    lrc_dir: Option<PathBuf>,
    done_tracks_dir: Option<PathBuf>,
    done_lrc_dir: Option<PathBuf>,
    follow_track: bool,
    rename_lyrics: bool,
    cleanse: bool,
    preview_lines: Option<usize>,
    api_base: Option<String>,
    user_agent: Option<String>,
    request_timeout: Option<Duration>,
    max_attempts: Option<u32>,
    retry: Option<RetrySettings>,
    solver_timeout: Option<Duration>,
    instrumental_payload: Option<InstrumentalPayload>,
    assume_yes: bool,
    dry_run: bool,
    single: Option<String>,
    logging: Option<LoggingConfig>,
}

impl AppConfigBuilder {
    pub fn tracks_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.tracks_dir = Some(path.into());
        self
    }

    pub fn lrc_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.lrc_dir = Some(path.into());
        self
    }

    pub fn done_tracks_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.done_tracks_dir = Some(path.into());
        self
    }

    pub fn done_lrc_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.done_lrc_dir = Some(path.into());
        self
    }

    pub fn follow_track(mut self, enabled: bool) -> Self {
        self.follow_track = enabled;
        self
    }

    pub fn rename_lyrics(mut self, enabled: bool) -> Self {
        self.rename_lyrics = enabled;
        self
    }

    pub fn cleanse(mut self, enabled: bool) -> Self {
        self.cleanse = enabled;
        self
    }

    pub fn preview_lines(mut self, lines: usize) -> Self {
        self.preview_lines = Some(lines);
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Override only the attempt budget, keeping the default schedule.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn solver_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = Some(timeout);
        self
    }

    pub fn instrumental_payload(mut self, mode: InstrumentalPayload) -> Self {
        self.instrumental_payload = Some(mode);
        self
    }

    pub fn assume_yes(mut self, enabled: bool) -> Self {
        self.assume_yes = enabled;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn single(mut self, file_name: impl Into<String>) -> Self {
        self.single = Some(file_name.into());
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Resolve against the process environment.
    pub fn build(self) -> Result<AppConfig> {
        self.build_with_env(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn build_with_env<F>(self, env: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_path = |key: &str| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| PathBuf::from(v.trim()))
        };

        let tracks_dir = self
            .tracks_dir
            .or_else(|| env_path(ENV_TRACKS_DIR))
            .unwrap_or_else(|| PathBuf::from("."));
        let lrc_dir = self
            .lrc_dir
            .or_else(|| env_path(ENV_LRC_DIR))
            .unwrap_or_else(|| tracks_dir.clone());
        let done_tracks_dir = self
            .done_tracks_dir
            .or_else(|| env_path(ENV_DONE_TRACKS_DIR));
        let done_lrc_dir = self.done_lrc_dir.or_else(|| env_path(ENV_DONE_LRC_DIR));

        let preview_lines = self
            .preview_lines
            .or_else(|| parse_env(&env, ENV_PREVIEW_LINES))
            .unwrap_or(DEFAULT_PREVIEW_LINES);

        let mut retry = self.retry.unwrap_or_default();
        if let Some(attempts) = self
            .max_attempts
            .or_else(|| parse_env(&env, ENV_MAX_HTTP_RETRIES))
        {
            retry.max_attempts = attempts;
        }

        let solver_timeout = self
            .solver_timeout
            .or_else(|| parse_env::<u64, _>(&env, ENV_SOLVER_TIMEOUT_SECS).map(Duration::from_secs))
            .unwrap_or(DEFAULT_SOLVER_TIMEOUT);

        let instrumental_payload = match self.instrumental_payload {
            Some(mode) => mode,
            None => match env(ENV_INSTRUMENTAL_PAYLOAD) {
                Some(raw) => raw.parse()?,
                None => InstrumentalPayload::default(),
            },
        };

        let config = AppConfig {
            tracks_dir,
            lrc_dir,
            done_tracks_dir,
            done_lrc_dir,
            follow_track: self.follow_track,
            rename_lyrics: self.rename_lyrics,
            cleanse: self.cleanse,
            preview_lines,
            api_base: self
                .api_base
                .or_else(|| env(ENV_API_BASE))
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            user_agent: self
                .user_agent
                .or_else(|| env(ENV_USER_AGENT))
                .unwrap_or_else(default_user_agent),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            retry,
            solver_timeout,
            instrumental_payload,
            assume_yes: self.assume_yes,
            dry_run: self.dry_run,
            single: self.single,
            logging: self.logging.unwrap_or_else(|| {
                LoggingConfig::default()
                    .with_format(LogFormat::Compact)
                    .with_level(LogLevel::Info)
            }),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Parse an env value, ignoring anything unparseable.
fn parse_env<T, F>(env: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(key).and_then(|raw| raw.trim().parse().ok())
}
