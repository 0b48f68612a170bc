//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ytbatch_core::Config;

/// Download and convert a batch of videos or playlists to audio.
///
/// Identifiers already recorded in the ledger are skipped, so an
/// interrupted batch can simply be run again.
#[derive(Debug, Parser)]
#[command(name = "ytbatch", version, about)]
pub struct Cli {
    /// URLs or IDs to process.
    #[arg(value_name = "IDENTIFIER")]
    pub identifiers: Vec<String>,

    /// TOML configuration file.
    #[arg(short, long, env = "YTBATCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Ledger file recording completed identifiers.
    #[arg(long, value_name = "PATH")]
    pub ledger: Option<PathBuf>,

    /// Neither consult nor update the ledger.
    #[arg(short, long)]
    pub skip_ledger: bool,

    /// Base directory for downloads.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Download format selector.
    #[arg(short, long, value_name = "FORMAT")]
    pub download_format: Option<String>,

    /// Target audio format.
    #[arg(short, long, value_name = "FORMAT")]
    pub audio_format: Option<String>,

    /// Audio quality (0 is best).
    #[arg(long, value_name = "QUALITY")]
    pub audio_quality: Option<String>,

    /// Keep the original video file.
    #[arg(short, long)]
    pub keep: bool,

    /// Downloader program to invoke.
    #[arg(long, value_name = "PATH")]
    pub program: Option<PathBuf>,

    /// Embed the downloaded thumbnail into every chapter file.
    #[arg(long)]
    pub embed_thumbnails: bool,

    /// Also write logs to this file. A timestamp is added to the name.
    #[arg(short, long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Format of the log file.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Write the run summary as JSON to this file.
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Write Prometheus metrics to this file after the run.
    #[arg(long, value_name = "PATH")]
    pub metrics_textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Trimmed, non-blank identifiers in input order.
    pub fn normalized_identifiers(&self) -> Vec<String> {
        self.identifiers
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.ledger {
            config.ledger.path = Some(path.clone());
        }
        if self.skip_ledger {
            config.ledger.enabled = false;
        }
        if let Some(dir) = &self.output_dir {
            config.task.output_dir = dir.clone();
        }
        if let Some(format) = &self.download_format {
            config.task.download_format = format.clone();
        }
        if let Some(format) = &self.audio_format {
            config.task.audio_format = format.clone();
        }
        if let Some(quality) = &self.audio_quality {
            config.task.audio_quality = quality.clone();
        }
        if self.keep {
            config.task.keep_original = true;
        }
        if let Some(program) = &self.program {
            config.task.program = program.clone();
        }
        if self.embed_thumbnails {
            config.postprocess.embed_thumbnails = true;
        }
        if let Some(path) = &self.metrics_textfile {
            config.metrics.textfile = Some(path.clone());
        }
    }
}
