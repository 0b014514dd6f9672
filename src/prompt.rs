//! Interactive answers on the terminal.
//!
//! Prompts go to stdout and logs go to stderr, so the two never interleave
//! on a redirected log. Reading stdin blocks, so every read runs on the
//! blocking pool and races the run's cancellation token.

use async_trait::async_trait;
use core_metadata::{CleansedLyrics, LyricCandidate, TrackMetadata};
use core_publish::{Decision, LyricsRecord, PayloadSource, PublishPayload};
use core_runtime::logging::file_label;
use core_service::{DecisionProvider, Result, ServiceError};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Which answers a prompt accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Menu {
    /// `1..=n`, manual path, instrumental, skip, quit
    Candidates(usize),
    /// manual path, instrumental, skip, quit
    Missing,
    /// external, local, skip, quit
    External,
}

impl Menu {
    fn legend(&self) -> String {
        match self {
            Menu::Candidates(n) => format!(
                "[1-{}] pick  [m] manual path  [i] instrumental  [s] skip  [q] quit",
                n
            ),
            Menu::Missing => "[m] manual path  [i] instrumental  [s] skip  [q] quit".to_string(),
            Menu::External => "[e] use external  [l] use local  [s] skip  [q] quit".to_string(),
        }
    }
}

/// What the operator typed, before any follow-up question.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Answer {
    Decision(Decision),
    /// Manual path requested; the path itself comes next (or inline after `m`).
    ManualPath(Option<String>),
}

fn parse_answer(input: &str, menu: Menu) -> Option<Answer> {
    let input = input.trim();
    let lower = input.to_lowercase();

    let common = match lower.as_str() {
        "s" | "skip" => Some(Decision::Skip),
        "q" | "quit" | "abort" => Some(Decision::Abort),
        _ => None,
    };
    if let Some(decision) = common {
        return Some(Answer::Decision(decision));
    }

    match menu {
        Menu::Candidates(_) | Menu::Missing => {
            if lower == "i" || lower == "instrumental" {
                return Some(Answer::Decision(Decision::MarkInstrumental));
            }
            if lower == "m" {
                return Some(Answer::ManualPath(None));
            }
            if let Some(path) = input.strip_prefix("m ").or_else(|| input.strip_prefix("M ")) {
                return Some(Answer::ManualPath(Some(path.trim().to_string())));
            }
            if let Menu::Candidates(n) = menu {
                if let Ok(choice) = lower.parse::<usize>() {
                    if (1..=n).contains(&choice) {
                        return Some(Answer::Decision(Decision::Pick(choice - 1)));
                    }
                }
            }
            None
        }
        Menu::External => match lower.as_str() {
            "e" | "external" => Some(Answer::Decision(Decision::UseExternal)),
            "l" | "local" => Some(Answer::Decision(Decision::UseLocal)),
            _ => None,
        },
    }
}

fn parse_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

pub struct TerminalPrompter {
    cancel: CancellationToken,
}

impl TerminalPrompter {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Print `question`, then read one line from stdin.
    async fn ask(&self, question: String) -> Result<String> {
        let read = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{} ", question)?;
            stdout.flush()?;
            drop(stdout);

            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
            }
            Ok(line)
        });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            joined = read => match joined {
                Ok(Ok(line)) => Ok(line.trim().to_string()),
                Ok(Err(e)) => Err(ServiceError::Prompt(e.to_string())),
                Err(e) => Err(ServiceError::Prompt(e.to_string())),
            },
        }
    }

    async fn menu(&self, heading: String, menu: Menu) -> Result<Decision> {
        println!("{}", heading);
        loop {
            let input = self.ask(format!("{}\n>", menu.legend())).await?;
            match parse_answer(&input, menu) {
                Some(Answer::Decision(decision)) => return Ok(decision),
                Some(Answer::ManualPath(Some(path))) => return Ok(Decision::ManualPath(path)),
                Some(Answer::ManualPath(None)) => {
                    let path = self.ask("Lyric file path:".to_string()).await?;
                    return Ok(Decision::ManualPath(path));
                }
                None => println!("Unrecognized answer: {:?}", input),
            }
        }
    }

    async fn confirm(&self, question: String) -> Result<bool> {
        let input = self.ask(format!("{} [y/N]", question)).await?;
        Ok(parse_yes(&input))
    }
}

#[async_trait]
impl DecisionProvider for TerminalPrompter {
    async fn choose_candidate(
        &self,
        track: &TrackMetadata,
        candidates: &[LyricCandidate],
    ) -> Result<Decision> {
        let mut heading = format!("Several lyric files match {}:", track);
        for (i, candidate) in candidates.iter().enumerate() {
            heading.push_str(&format!("\n  {}. {}", i + 1, candidate.path.display()));
        }
        self.menu(heading, Menu::Candidates(candidates.len())).await
    }

    async fn on_missing_lyrics(&self, track: &TrackMetadata) -> Result<Decision> {
        self.menu(
            format!("No lyric file found for {} ({})", track, file_label(&track.path)),
            Menu::Missing,
        )
        .await
    }

    async fn on_external_lyrics(
        &self,
        track: &TrackMetadata,
        external: &LyricsRecord,
    ) -> Result<Decision> {
        let kind = if external.instrumental {
            "instrumental"
        } else if external.synced_lyrics.trim().is_empty() {
            "plain only"
        } else {
            "synced"
        };
        self.menu(
            format!("LRCLIB found {} lyrics for {} elsewhere.", kind, track),
            Menu::External,
        )
        .await
    }

    async fn confirm_publish(
        &self,
        track: &TrackMetadata,
        payload: &PublishPayload,
        source: PayloadSource,
    ) -> Result<bool> {
        let what = if payload.is_instrumental() {
            "an instrumental marker".to_string()
        } else {
            format!("{} lyrics", source)
        };
        self.confirm(format!(
            "Publish {} for {} [{}] ({}s)?",
            what,
            track,
            payload.album_name,
            payload.duration
        ))
        .await
    }

    async fn confirm_extension(&self, path: &Path) -> Result<bool> {
        self.confirm(format!("{} is not an .lrc file. Use it anyway?", path.display()))
            .await
    }

    async fn preview(&self, heading: &str, lyrics: &CleansedLyrics, lines: usize) -> Result<()> {
        println!("--- {} ---", heading);
        if lyrics.instrumental {
            println!("(instrumental)");
            return Ok(());
        }
        let (plain, synced) = lyrics.preview(lines);
        let shown = if synced.is_empty() { plain } else { synced };
        for line in shown {
            println!("  {}", line);
        }
        Ok(())
    }
}
