//! Tracing subscriber setup.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::args::LogFormat;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber: stderr always, plus an optional log file.
///
/// Returns the path of the log file actually opened. Failing to open it is
/// logged as a warning and leaves logging on stderr only.
pub fn init(log_file: Option<&Path>, format: LogFormat) -> Option<PathBuf> {
    let mut file_error = None;
    let mut opened = None;

    let file_layer: Option<BoxedLayer> = log_file.and_then(|base| {
        let path = timestamped(base, Local::now());
        match open(&path) {
            Ok(file) => {
                let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
                opened = Some(path);
                Some(match format {
                    LogFormat::Text => layer.boxed(),
                    LogFormat::Json => layer.json().boxed(),
                })
            }
            Err(e) => {
                file_error = Some(format!("Could not open log file {:?}: {}", path, e));
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(message) = file_error {
        tracing::warn!("{}. Logging to stderr only", message);
    }
    opened
}

fn open(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    File::create(path)
}

/// `<stem>_<YYYY-MM-DD_HH-MM-SS><ext>` next to `base`.
pub fn timestamped(base: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ytbatch".to_string());
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let name = format!("{}_{}{}", stem, now.format("%Y-%m-%d_%H-%M-%S"), ext);
    base.with_file_name(name)
}
