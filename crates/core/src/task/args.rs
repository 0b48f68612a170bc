//! Argument profile for the external downloader.

use std::path::Path;

use crate::config::TaskConfig;

const PROGRESS_TEMPLATE: &str = "[download] %(progress._percent_str)s (%(progress._total_bytes_str)s @ %(progress._speed_str)s ETA %(progress._eta_str)s)";

/// Builds the command line for one identifier.
#[derive(Debug, Clone)]
pub struct TaskArgs {
    config: TaskConfig,
    write_thumbnails: bool,
}

impl TaskArgs {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            config,
            write_thumbnails: false,
        }
    }

    /// Ask for the thumbnail to be written next to the audio files.
    pub fn with_thumbnails(mut self, enabled: bool) -> Self {
        self.write_thumbnails = enabled;
        self
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Arguments for `identifier`.
    ///
    /// When `manifest` is set, the downloader is asked to write every final
    /// file path into it.
    pub fn build(&self, identifier: &str, manifest: Option<&Path>) -> Vec<String> {
        let output_dir = self.config.output_dir.to_string_lossy().to_string();

        if let Some(template) = &self.config.args {
            let mut args: Vec<String> = template
                .iter()
                .map(|a| a.replace("{id}", identifier).replace("{output_dir}", &output_dir))
                .collect();
            args.extend(self.config.extra_args.iter().cloned());
            return args;
        }

        let mut args = Vec::new();

        if self.config.ignore_errors {
            args.push("--ignore-errors".to_string());
        }

        // Keep color codes even though output goes through a pipe
        args.extend([
            "--color".to_string(),
            "always".to_string(),
            "--progress".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
        ]);

        args.extend([
            "-f".to_string(),
            self.config.download_format.clone(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.config.audio_format.clone(),
            "--audio-quality".to_string(),
            self.config.audio_quality.clone(),
        ]);

        if self.config.split_chapters {
            args.push("--split-chapters".to_string());
        }

        args.extend([
            "--embed-thumbnail".to_string(),
            "-o".to_string(),
            format!(
                "chapter:{}/%(title)s/%(section_title)s - %(title)s.%(ext)s",
                output_dir
            ),
            "-o".to_string(),
            format!("{}/%(title)s/%(title)s.%(ext)s", output_dir),
        ]);

        if self.config.keep_original {
            args.push("--keep-video".to_string());
        }

        if self.write_thumbnails {
            args.extend([
                "--write-thumbnail".to_string(),
                "-o".to_string(),
                format!("thumbnail:{}/%(title)s/%(title)s.%(ext)s", output_dir),
            ]);
        }

        if let Some(manifest) = manifest {
            args.extend([
                "--print-to-file".to_string(),
                "after_move:filepath".to_string(),
                manifest.to_string_lossy().to_string(),
            ]);
        }

        args.extend(self.config.extra_args.iter().cloned());

        // Identifier goes last, after the end of options, since ids may
        // start with '-'
        args.push("--".to_string());
        args.push(identifier.to_string());
        args
    }
}
