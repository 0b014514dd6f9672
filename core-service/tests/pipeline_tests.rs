//! Whole-pipeline runs over a temporary library with scripted collaborators

use async_trait::async_trait;
use bridge_desktop::LocalFileMover;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_metadata::{CleansedLyrics, LyricCandidate, MetadataError, TagReader, TrackMetadata};
use core_publish::{Decision, LyricsRecord, PayloadSource, PublishPayload};
use core_runtime::config::{AppConfig, AppConfigBuilder};
use core_service::{
    CoreDependencies, DecisionProvider, FailureKind, Pipeline, Result, TrackResult,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Tags keyed by audio file name.
struct FakeTags(HashMap<String, (String, String, f64)>);

#[async_trait]
impl TagReader for FakeTags {
    async fn read(&self, path: &Path) -> core_metadata::Result<TrackMetadata> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        match self.0.get(&name) {
            Some((title, artist, duration)) => Ok(TrackMetadata::new(
                path,
                title.as_str(),
                artist.as_str(),
                Some("Album".to_string()),
                *duration,
            )),
            None => Err(MetadataError::IncompleteTags(name)),
        }
    }
}

#[derive(Default)]
struct FakeLrclib {
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    cached: Option<Value>,
    external: Option<Value>,
    publish_status: Option<u16>,
}

impl FakeLrclib {
    fn endpoints(log: &Mutex<Vec<HttpRequest>>) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .map(|r| r.url.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl HttpClient for FakeLrclib {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let lookup = |body: &Option<Value>| match body {
            Some(value) => HttpResponse::new(200, value.to_string()),
            None => HttpResponse::new(404, ""),
        };
        Ok(match request.url.rsplit('/').next().unwrap_or_default() {
            "get-cached" => lookup(&self.cached),
            "get" => lookup(&self.external),
            "request-challenge" => HttpResponse::new(
                200,
                json!({"prefix": "p", "target": "ff".repeat(32)}).to_string(),
            ),
            "publish" => HttpResponse::new(self.publish_status.unwrap_or(201), ""),
            _ => HttpResponse::new(500, ""),
        })
    }
}

#[derive(Default)]
struct ScriptedDecisions {
    answers: Mutex<VecDeque<Decision>>,
    decline_publish: bool,
    accept_extension: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedDecisions {
    fn answering(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            ..Self::default()
        }
    }

    fn next(&self, call: String) -> Decision {
        self.calls.lock().unwrap().push(call);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Decision::Skip)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionProvider for ScriptedDecisions {
    async fn choose_candidate(
        &self,
        _track: &TrackMetadata,
        candidates: &[LyricCandidate],
    ) -> Result<Decision> {
        Ok(self.next(format!("choose:{}", candidates.len())))
    }

    async fn on_missing_lyrics(&self, _track: &TrackMetadata) -> Result<Decision> {
        Ok(self.next("missing".to_string()))
    }

    async fn on_external_lyrics(
        &self,
        _track: &TrackMetadata,
        _external: &LyricsRecord,
    ) -> Result<Decision> {
        Ok(self.next("external".to_string()))
    }

    async fn confirm_publish(
        &self,
        _track: &TrackMetadata,
        _payload: &PublishPayload,
        source: PayloadSource,
    ) -> Result<bool> {
        self.calls.lock().unwrap().push(format!("confirm:{}", source));
        Ok(!self.decline_publish)
    }

    async fn confirm_extension(&self, _path: &Path) -> Result<bool> {
        self.calls.lock().unwrap().push("extension".to_string());
        Ok(self.accept_extension)
    }

    async fn preview(&self, _heading: &str, _lyrics: &CleansedLyrics, _lines: usize) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Library fixture
// ---------------------------------------------------------------------------

struct Library {
    _tmp: TempDir,
    root: PathBuf,
    tags: HashMap<String, (String, String, f64)>,
}

impl Library {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        std::fs::create_dir_all(root.join("tracks")).unwrap();
        std::fs::create_dir_all(root.join("lrc")).unwrap();
        Self {
            _tmp: tmp,
            root,
            tags: HashMap::new(),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn add_track(&mut self, rel: &str, title: &str, artist: &str) {
        let path = self.path(&format!("tracks/{}", rel));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"audio").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.tags
            .insert(name, (title.to_string(), artist.to_string(), 180.0));
    }

    fn add_lyrics(&self, rel: &str, text: &str) {
        let path = self.path(&format!("lrc/{}", rel));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn config(&self, build: impl FnOnce(AppConfigBuilder) -> AppConfigBuilder) -> AppConfig {
        build(
            AppConfig::builder()
                .tracks_dir(self.path("tracks"))
                .lrc_dir(self.path("lrc"))
                .done_tracks_dir(self.path("done/tracks"))
                .done_lrc_dir(self.path("done/lrc"))
                .assume_yes(true),
        )
        .build_with_env(|_| None)
        .unwrap()
    }

    fn pipeline(
        &self,
        config: AppConfig,
        http: FakeLrclib,
        decisions: Arc<ScriptedDecisions>,
    ) -> Pipeline {
        let deps = CoreDependencies::new(
            Arc::new(http),
            Arc::new(LocalFileMover::new()),
            Arc::new(FakeTags(self.tags.clone())),
        );
        Pipeline::new(config, deps, decisions).with_dirs(self.root.clone(), None)
    }
}

const SIMPLE_LRC: &str = "[ti:Song]\n[00:01.00]作词：Someone\n[00:02.00]Hello\n";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_publishes_and_moves_files() {
    let mut lib = Library::new();
    lib.add_track("album/song.flac", "Song", "Alice");
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);

    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let decisions = Arc::new(ScriptedDecisions::default());
    let config = lib.config(|b| b.cleanse(true).rename_lyrics(true));
    let pipeline = lib.pipeline(config, http, decisions.clone());

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(
        summary.reports[0].result,
        TrackResult::Published(PayloadSource::Local)
    );
    assert_eq!(
        FakeLrclib::endpoints(&log),
        vec!["get-cached", "get", "request-challenge", "publish"]
    );

    let body: Value = log.lock().unwrap()[3].json_body().unwrap();
    assert_eq!(body["syncedLyrics"], "[00:02.00]Hello");
    assert_eq!(body["plainLyrics"], "Hello");
    assert_eq!(body["artistName"], "Alice");
    assert_eq!(body["duration"], 180);

    assert!(lib.path("done/tracks/song.flac").exists());
    let moved_lyrics = lib.path("done/lrc/song.lrc");
    assert_eq!(
        std::fs::read_to_string(moved_lyrics).unwrap(),
        "[00:02.00]Hello\n"
    );
    assert!(!lib.path("tracks/album").exists());
    assert!(decisions.calls().is_empty());
}

#[tokio::test]
async fn test_cache_hit_moves_files_without_upload() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);

    let http = FakeLrclib {
        cached: Some(json!({"trackName": "Song", "duration": 180.0, "plainLyrics": "Hello"})),
        ..FakeLrclib::default()
    };
    let log = http.requests.clone();
    let pipeline = lib.pipeline(
        lib.config(|b| b),
        http,
        Arc::new(ScriptedDecisions::default()),
    );

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.already_existed, 1);
    assert_eq!(FakeLrclib::endpoints(&log), vec!["get-cached"]);
    assert!(lib.path("done/tracks/song.flac").exists());
    assert!(lib.path("done/lrc/Alice - Song.lrc").exists());
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);

    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let pipeline = lib.pipeline(
        lib.config(|b| b.dry_run(true).cleanse(true)),
        http,
        Arc::new(ScriptedDecisions::default()),
    );

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(FakeLrclib::endpoints(&log), vec!["get-cached", "get"]);
    assert!(lib.path("tracks/song.flac").exists());
    assert_eq!(
        std::fs::read_to_string(lib.path("lrc/Alice - Song.lrc")).unwrap(),
        SIMPLE_LRC
    );
}

#[tokio::test]
async fn test_missing_lyrics_skip() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");

    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let decisions = Arc::new(ScriptedDecisions::answering([Decision::Skip]));
    let pipeline = lib.pipeline(lib.config(|b| b), http, decisions.clone());

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(decisions.calls(), vec!["missing"]);
    assert!(log.lock().unwrap().is_empty());
    assert!(lib.path("tracks/song.flac").exists());
}

#[tokio::test]
async fn test_mark_instrumental_publishes_marker() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");

    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let decisions = Arc::new(ScriptedDecisions::answering([Decision::MarkInstrumental]));
    let pipeline = lib.pipeline(lib.config(|b| b), http, decisions);

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        summary.reports[0].result,
        TrackResult::Published(PayloadSource::Instrumental)
    );
    let body: Value = log.lock().unwrap().last().unwrap().json_body().unwrap();
    assert!(body.get("plainLyrics").is_none());
    assert!(body.get("syncedLyrics").is_none());
    assert!(lib.path("done/tracks/song.flac").exists());
}

#[tokio::test]
async fn test_pick_among_multiple_matches() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");
    lib.add_lyrics("a/Alice - Song.lrc", "[00:01.00]first");
    lib.add_lyrics("b/Alice & Bob - Song.lrc", "[00:01.00]second");

    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let decisions = Arc::new(ScriptedDecisions::answering([Decision::Pick(1)]));
    let pipeline = lib.pipeline(lib.config(|b| b), http, decisions.clone());

    pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(decisions.calls(), vec!["choose:2"]);
    let body: Value = log.lock().unwrap().last().unwrap().json_body().unwrap();
    assert_eq!(body["plainLyrics"], "second");
    assert!(lib.path("done/lrc/Alice & Bob - Song.lrc").exists());
    assert!(lib.path("lrc/a/Alice - Song.lrc").exists());
}

#[tokio::test]
async fn test_manual_path_retries_then_skips() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");

    let decisions = Arc::new(ScriptedDecisions::answering([
        Decision::ManualPath("missing.lrc".into()),
        Decision::ManualPath("  \"\"  ".into()),
        Decision::ManualPath("lrc".into()),
    ]));
    let pipeline = lib.pipeline(lib.config(|b| b), FakeLrclib::default(), decisions.clone());

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(decisions.calls(), vec!["missing", "missing", "missing"]);
}

#[tokio::test]
async fn test_manual_path_with_other_extension_needs_confirmation() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");
    std::fs::write(lib.path("words.txt"), "plain words").unwrap();

    let decisions = Arc::new(ScriptedDecisions {
        accept_extension: true,
        ..ScriptedDecisions::answering([Decision::ManualPath("\"words.txt\"".into())])
    });
    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let pipeline = lib.pipeline(lib.config(|b| b.assume_yes(false)), http, decisions.clone());

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(decisions.calls(), vec!["missing", "extension", "confirm:local"]);
    let body: Value = log.lock().unwrap().last().unwrap().json_body().unwrap();
    assert_eq!(body["plainLyrics"], "plain words");
    assert_eq!(body["syncedLyrics"], "");
}

#[tokio::test]
async fn test_declined_confirmation_skips() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);

    let decisions = Arc::new(ScriptedDecisions {
        decline_publish: true,
        ..ScriptedDecisions::default()
    });
    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let pipeline = lib.pipeline(lib.config(|b| b.assume_yes(false)), http, decisions);

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(FakeLrclib::endpoints(&log), vec!["get-cached", "get"]);
    assert!(lib.path("tracks/song.flac").exists());
}

#[tokio::test]
async fn test_external_lyrics_choice() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);

    let http = FakeLrclib {
        external: Some(json!({"plainLyrics": "remote", "syncedLyrics": "[00:05.00]remote"})),
        ..FakeLrclib::default()
    };
    let log = http.requests.clone();
    let decisions = Arc::new(ScriptedDecisions::answering([Decision::UseExternal]));
    let pipeline = lib.pipeline(lib.config(|b| b), http, decisions.clone());

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        summary.reports[0].result,
        TrackResult::Published(PayloadSource::External)
    );
    assert_eq!(decisions.calls(), vec!["external"]);
    let body: Value = log.lock().unwrap().last().unwrap().json_body().unwrap();
    assert_eq!(body["syncedLyrics"], "[00:05.00]remote");
}

#[tokio::test]
async fn test_abort_on_external_lyrics_stops_run() {
    let mut lib = Library::new();
    lib.add_track("a.flac", "Song", "Alice");
    lib.add_track("b.flac", "Second", "Alice");
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);
    lib.add_lyrics("Alice - Second.lrc", "[00:01.00]two");

    let http = FakeLrclib {
        external: Some(json!({"plainLyrics": "remote", "syncedLyrics": "[00:05.00]remote"})),
        ..FakeLrclib::default()
    };
    let log = http.requests.clone();
    let decisions = Arc::new(ScriptedDecisions::answering([Decision::Abort]));
    let pipeline = lib.pipeline(lib.config(|b| b), http, decisions.clone());

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.total(), 0);
    assert_eq!(decisions.calls(), vec!["external"]);
    assert_eq!(FakeLrclib::endpoints(&log), vec!["get-cached", "get"]);
    assert!(lib.path("tracks/a.flac").exists());
    assert!(lib.path("lrc/Alice - Song.lrc").exists());
}

#[tokio::test]
async fn test_rejected_publish_fails_track_and_run_continues() {
    let mut lib = Library::new();
    lib.add_track("a.flac", "First", "Alice");
    lib.add_track("b.flac", "Second", "Alice");
    lib.add_lyrics("Alice - First.lrc", "[00:01.00]one");
    lib.add_lyrics("Alice - Second.lrc", "[00:01.00]two");

    let http = FakeLrclib {
        publish_status: Some(400),
        ..FakeLrclib::default()
    };
    let pipeline = lib.pipeline(lib.config(|b| b), http, Arc::new(ScriptedDecisions::default()));

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.failed, 2);
    assert!(matches!(
        summary.reports[0].result,
        TrackResult::Failed {
            kind: FailureKind::Rejected,
            ..
        }
    ));
    assert!(lib.path("tracks/a.flac").exists());
    assert!(lib.path("lrc/Alice - First.lrc").exists());
}

#[tokio::test]
async fn test_unreadable_tags_skip_track() {
    let mut lib = Library::new();
    lib.add_track("good.flac", "Song", "Alice");
    std::fs::write(lib.path("tracks/bad.mp3"), b"junk").unwrap();
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);

    let pipeline = lib.pipeline(
        lib.config(|b| b),
        FakeLrclib::default(),
        Arc::new(ScriptedDecisions::default()),
    );

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.reports[0].track, "bad.mp3");
}

#[tokio::test]
async fn test_abort_stops_run() {
    let mut lib = Library::new();
    lib.add_track("a.flac", "First", "Alice");
    lib.add_track("b.flac", "Second", "Alice");

    let decisions = Arc::new(ScriptedDecisions::answering([Decision::Abort]));
    let pipeline = lib.pipeline(lib.config(|b| b), FakeLrclib::default(), decisions.clone());

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.total(), 0);
    assert_eq!(decisions.calls(), vec!["missing"]);
}

#[tokio::test]
async fn test_cancelled_run_processes_nothing() {
    let mut lib = Library::new();
    lib.add_track("song.flac", "Song", "Alice");
    lib.add_lyrics("Alice - Song.lrc", SIMPLE_LRC);

    let http = FakeLrclib::default();
    let log = http.requests.clone();
    let pipeline = lib.pipeline(lib.config(|b| b), http, Arc::new(ScriptedDecisions::default()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = pipeline.run(&cancel).await.unwrap();

    assert!(summary.aborted);
    assert!(log.lock().unwrap().is_empty());
    assert!(lib.path("tracks/song.flac").exists());
}

#[tokio::test]
async fn test_single_file_filter() {
    let mut lib = Library::new();
    lib.add_track("a.flac", "First", "Alice");
    lib.add_track("b.flac", "Second", "Alice");
    lib.add_lyrics("Alice - Second.lrc", "[00:01.00]two");

    let pipeline = lib.pipeline(
        lib.config(|b| b.single("b.flac")),
        FakeLrclib::default(),
        Arc::new(ScriptedDecisions::default()),
    );

    let summary = pipeline.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.total(), 1);
    assert_eq!(summary.published, 1);
}
