use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name of the completion ledger when no path is configured.
pub const DEFAULT_LEDGER_FILENAME: &str = "ytmp3_processed_archive.txt";

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub task: TaskConfig,
    #[serde(default)]
    pub postprocess: PostProcessConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Completion ledger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// Ledger file. When unset, the file lives next to the executable.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// When false, the ledger is neither consulted nor appended to.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            enabled: true,
        }
    }
}

impl LedgerConfig {
    /// Resolve the ledger location.
    ///
    /// Falls back to the directory of the running executable, then to the
    /// current working directory.
    pub fn resolve_path(&self) -> std::io::Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        let base = match std::env::current_exe() {
            Ok(exe) => exe
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(e) => {
                tracing::warn!(
                    "Could not determine executable path: {}. Using current directory.",
                    e
                );
                std::env::current_dir()?
            }
        };

        Ok(base.join(DEFAULT_LEDGER_FILENAME))
    }
}

/// External task (yt-dlp) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskConfig {
    /// Program to invoke for every identifier.
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Base directory for downloaded artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Download format selector (`-f`).
    #[serde(default = "default_download_format")]
    pub download_format: String,
    /// Target audio format for extraction.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    /// Audio quality passed to `--audio-quality`.
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    /// Keep the original downloaded file after extraction.
    #[serde(default)]
    pub keep_original: bool,
    /// Split the output into one file per chapter.
    #[serde(default = "default_true")]
    pub split_chapters: bool,
    /// Keep going when single entries of a playlist fail.
    #[serde(default = "default_true")]
    pub ignore_errors: bool,
    /// Arguments appended after the built-in profile.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Full argument override. `{id}` and `{output_dir}` are substituted.
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

fn default_program() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_download_format() -> String {
    "bv*+ba/b".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "0".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            output_dir: default_output_dir(),
            download_format: default_download_format(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            keep_original: false,
            split_chapters: true,
            ignore_errors: true,
            extra_args: Vec::new(),
            args: None,
        }
    }
}

/// Post-processing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostProcessConfig {
    /// Embed the downloaded thumbnail into every chapter file.
    #[serde(default)]
    pub embed_thumbnails: bool,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            embed_thumbnails: false,
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Prometheus textfile written after the run.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}
