mod args;
mod logging;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{error, info, warn};

use ytbatch_core::{
    load_config, metrics, validate_config, CancellationController, CommandRunner, Ledger,
    LedgerError, Orchestrator, PostProcessor, RunSummary, TaskRunner, ThumbnailEmbedder,
};

use args::Cli;

/// Exit code for invalid invocations.
const USAGE_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let identifiers = cli.normalized_identifiers();
    if identifiers.is_empty() {
        eprintln!("error: no identifiers given\n\n{}", Cli::command().render_usage());
        return ExitCode::from(USAGE_ERROR);
    }

    if let Some(path) = logging::init(cli.log_file.as_deref(), cli.log_format) {
        info!("Logging to {:?}", path);
    }

    match run(&cli, identifiers).await {
        Ok(summary) => ExitCode::from(summary.exit_code() as u8),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, identifiers: Vec<String>) -> Result<RunSummary> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    validate_config(&config).context("Configuration validation failed")?;

    let ledger = if config.ledger.enabled {
        let path = config
            .ledger
            .resolve_path()
            .map_err(LedgerError::Locate)
            .context("Failed to initialize ledger")?;
        let ledger = Ledger::load(path).context("Failed to initialize ledger")?;
        Some(Arc::new(ledger))
    } else {
        info!("Ledger disabled, every identifier will be processed");
        None
    };

    let embed_thumbnails = config.postprocess.embed_thumbnails;
    let runner = CommandRunner::new(config.task.clone()).with_artifacts(embed_thumbnails);
    if let Err(e) = runner.validate().await {
        warn!("{} is not usable, jobs will likely fail: {}", runner.name(), e);
    }

    let controller = CancellationController::new();
    let listener = controller.listen();

    let mut orchestrator =
        Orchestrator::new(Arc::new(runner)).with_cancellation(controller.token());
    if let Some(ledger) = ledger {
        orchestrator = orchestrator.with_ledger(ledger);
    }
    if embed_thumbnails {
        let embedder = ThumbnailEmbedder::new(config.postprocess.clone())
            .with_audio_format(config.task.audio_format.clone());
        if let Err(e) = embedder.validate().await {
            warn!("Thumbnail embedding will not work: {}", e);
        }
        orchestrator = orchestrator.with_post_processor(Arc::new(embedder));
    }

    let summary = orchestrator.run(identifiers).await;
    listener.abort();
    let summary = summary?;

    println!("{}", summary);

    if let Some(path) = &cli.summary_json {
        if let Err(e) = write_summary_json(path, &summary) {
            warn!("Failed to write summary to {:?}: {:#}", path, e);
        }
    }
    if let Some(path) = &config.metrics.textfile {
        if let Err(e) = metrics::write_textfile(path) {
            warn!("Failed to write metrics to {:?}: {}", path, e);
        }
    }

    Ok(summary)
}

fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    std::fs::write(path, json).context("Failed to write file")?;
    Ok(())
}
