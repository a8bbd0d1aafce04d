mod cli;
mod progress;

use std::fs;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use feedmirror_fetch::{Fetcher, ReqwestTransport};
use feedmirror_sync::{RunReport, SyncOrchestrator};
use tracing::{debug, error};

use crate::cli::App;
use crate::progress::DownloadTracker;

/// Some resource failed or was corrupted.
const EXIT_RUN_FAILED: u8 = 1;
/// The mirror could not be set up at all.
const EXIT_INVOCATION: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Usage errors exit with 2 from clap itself.
    let app = App::parse();

    let show_progress = !app.quiet && io::stderr().is_terminal();
    let tracker = DownloadTracker::new(!show_progress);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(app.log_level().into()))
        .with_target(false)
        .with_writer(tracker.clone())
        .init();

    let report = match run(&app, &tracker).await {
        Ok(report) => report,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_INVOCATION);
        }
    };

    if app.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = %e, "cannot render run report"),
        }
    }

    if report.failed() {
        ExitCode::from(EXIT_RUN_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(app: &App, tracker: &DownloadTracker) -> Result<RunReport> {
    let config = app.mirror_config();
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("cannot create output directory {}", config.output_dir.display()))?;

    let options = app.transport_options();
    debug!(?options, "transport options");
    let transport = ReqwestTransport::new(&options).context("cannot build HTTP client")?;

    let fetcher = Fetcher::new(transport).with_progress(tracker.callback());

    Ok(SyncOrchestrator::new(config, fetcher).run().await)
}
