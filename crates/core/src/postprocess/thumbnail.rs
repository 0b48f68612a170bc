//! FFmpeg-based cover art embedding for split chapter files.
//!
//! yt-dlp only embeds the thumbnail into the file it downloaded, not into
//! the chapter files it splits off afterwards. This post-processor takes the
//! thumbnail left next to the chapters and attaches it to each of them.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::PostProcessError;
use super::traits::{PostProcessReport, PostProcessor};
use crate::config::PostProcessConfig;

/// Image extensions yt-dlp may write thumbnails with.
const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Suffix of the intermediate file written by ffmpeg.
const TEMP_SUFFIX: &str = ".tmp_thumb.mp3";

/// Audio format the embedding arguments are written for.
const SUPPORTED_FORMAT: &str = "mp3";

/// Embeds a directory's thumbnail into each of its MP3 files.
pub struct ThumbnailEmbedder {
    config: PostProcessConfig,
    audio_format: String,
}

impl ThumbnailEmbedder {
    pub fn new(config: PostProcessConfig) -> Self {
        Self {
            config,
            audio_format: SUPPORTED_FORMAT.to_string(),
        }
    }

    /// Set the audio format the task produces. Only mp3 output is embedded
    /// into; anything else is left untouched.
    pub fn with_audio_format(mut self, format: impl Into<String>) -> Self {
        self.audio_format = format.into();
        self
    }

    fn supports_format(&self) -> bool {
        self.audio_format.eq_ignore_ascii_case(SUPPORTED_FORMAT)
    }

    /// Creates an embedder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PostProcessConfig::default())
    }

    /// Builds ffmpeg arguments attaching `thumbnail` to `chapter`.
    fn build_args(chapter: &Path, thumbnail: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            chapter.to_string_lossy().to_string(),
            "-i".to_string(),
            thumbnail.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:a".to_string(),
            "-map".to_string(),
            "1:v".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-disposition:v".to_string(),
            "attached_pic".to_string(),
            "-id3v2_version".to_string(),
            "3".to_string(),
            "-metadata:s:v".to_string(),
            "title=Album cover".to_string(),
            "-metadata:s:v".to_string(),
            "comment=Cover (front)".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn is_thumbnail(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| THUMBNAIL_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn is_chapter(path: &Path) -> bool {
        let name = path.to_string_lossy();
        !name.ends_with(TEMP_SUFFIX)
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("mp3"))
                .unwrap_or(false)
    }

    /// Finds the thumbnail and the chapter files in `dir`.
    async fn scan(dir: &Path) -> Result<(Option<PathBuf>, Vec<PathBuf>), PostProcessError> {
        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|source| PostProcessError::ReadDir {
                    path: dir.to_path_buf(),
                    source,
                })?;

        let mut thumbnails = Vec::new();
        let mut chapters = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if Self::is_thumbnail(&path) {
                thumbnails.push(path);
            } else if Self::is_chapter(&path) {
                chapters.push(path);
            }
        }

        thumbnails.sort();
        chapters.sort();
        Ok((thumbnails.into_iter().next(), chapters))
    }

    /// Embeds `thumbnail` into `chapter`, replacing the chapter file.
    ///
    /// ffmpeg is killed if `cancel` fires first; the chapter is left as it was.
    async fn embed(
        &self,
        chapter: &Path,
        thumbnail: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), String> {
        let mut temp = chapter.as_os_str().to_owned();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);
        let _ = tokio::fs::remove_file(&temp).await;

        let run = Command::new(&self.config.ffmpeg_path)
            .args(Self::build_args(chapter, thumbnail, &temp))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            biased;
            output = run => output.map_err(|e| format!("failed to run ffmpeg: {}", e))?,
            _ = cancel.cancelled() => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err("cancelled".to_string());
            }
        };

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(format!(
                "ffmpeg exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        if let Err(e) = tokio::fs::rename(&temp, chapter).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(format!("failed to replace chapter file: {}", e));
        }

        Ok(())
    }

    async fn process_dir(
        &self,
        identifier: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PostProcessReport, PostProcessError> {
        let (thumbnail, chapters) = Self::scan(dir).await?;

        let Some(thumbnail) = thumbnail else {
            warn!("[{}] No thumbnail found in {:?}", identifier, dir);
            return Ok(PostProcessReport::default());
        };

        // Keep the thumbnail when there is nothing to put it in
        if chapters.is_empty() {
            warn!(
                "[{}] No {} files found in {:?}, keeping {:?}",
                identifier, SUPPORTED_FORMAT, dir, thumbnail
            );
            return Ok(PostProcessReport::default());
        }

        let mut report = PostProcessReport {
            attempted: true,
            ..Default::default()
        };

        for chapter in &chapters {
            if cancel.is_cancelled() {
                warn!(
                    "[{}] Shutting down, thumbnail not embedded in remaining files of {:?}",
                    identifier, dir
                );
                report.errors += 1;
                return Ok(report);
            }
            debug!("[{}] Embedding thumbnail into {:?}", identifier, chapter);
            match self.embed(chapter, &thumbnail, cancel).await {
                Ok(()) => report.files_processed += 1,
                Err(reason) => {
                    warn!("[{}] {:?}: {}", identifier, chapter, reason);
                    report.errors += 1;
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(report);
        }

        if let Err(e) = tokio::fs::remove_file(&thumbnail).await {
            warn!(
                "[{}] Could not remove thumbnail {:?}: {}",
                identifier, thumbnail, e
            );
        }

        info!(
            "[{}] Embedded thumbnail into {}/{} chapter files in {:?}",
            identifier,
            report.files_processed,
            chapters.len(),
            dir
        );
        Ok(report)
    }
}

#[async_trait]
impl PostProcessor for ThumbnailEmbedder {
    fn name(&self) -> &str {
        "thumbnail"
    }

    async fn process(
        &self,
        identifier: &str,
        dirs: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<PostProcessReport, PostProcessError> {
        let mut report = PostProcessReport::default();
        if !self.supports_format() {
            debug!(
                "[{}] Audio format {} is not embedded into, skipping",
                identifier, self.audio_format
            );
            return Ok(report);
        }
        for dir in dirs {
            report = report.merge(self.process_dir(identifier, dir, cancel).await?);
        }
        Ok(report)
    }

    async fn validate(&self) -> Result<(), PostProcessError> {
        if !self.supports_format() {
            return Err(PostProcessError::UnsupportedFormat {
                format: self.audio_format.clone(),
            });
        }

        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PostProcessError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    PostProcessError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(PostProcessError::FfmpegUnusable {
                reason: format!("-version exited with code {:?}", output.status.code()),
            });
        }
        Ok(())
    }
}
