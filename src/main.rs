//! `lrcup`: match local lyric files to audio tracks and publish them to LRCLIB.

mod cli;
mod prompt;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use core_runtime::logging::init_logging;
use core_service::{bootstrap_desktop, Pipeline};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::prompt::TerminalPrompter;

/// Conventional exit status after SIGINT.
const INTERRUPTED_EXIT: i32 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.into_config().context("Invalid configuration")?;

    init_logging(config.logging.clone()).context("Failed to initialize logging")?;
    info!(
        tracks_dir = %config.tracks_dir.display(),
        lrc_dir = %config.lrc_dir.display(),
        api_base = %config.api_base,
        "lrcup starting"
    );

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current step");
            watcher.cancel();
        }
    });

    let deps = bootstrap_desktop(&config).context("Failed to set up desktop bridges")?;
    let prompter = Arc::new(TerminalPrompter::new(cancel.clone()));
    let pipeline = Pipeline::new(config, deps, prompter);

    let summary = pipeline.run(&cancel).await.context("Run failed")?;

    println!();
    for report in &summary.reports {
        println!("{}", report);
    }
    for warning in &summary.warnings {
        println!("warning: {}", warning);
    }
    println!("{}", summary);

    if cancel.is_cancelled() {
        // A prompt may still hold a blocking stdin read; leave without
        // waiting for the runtime to drain it.
        std::process::exit(INTERRUPTED_EXIT);
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
