use super::{types::Config, ConfigError};

/// Placeholder replaced with the identifier in argument overrides.
pub(crate) const ID_PLACEHOLDER: &str = "{id}";

/// Validate configuration
/// Currently validates:
/// - Task program and formats are not empty
/// - Argument overrides reference the identifier
/// - Thumbnail embedding has an ffmpeg path
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.task.program.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "task.program cannot be empty".to_string(),
        ));
    }

    if config.task.download_format.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "task.download_format cannot be empty".to_string(),
        ));
    }

    if config.task.audio_format.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "task.audio_format cannot be empty".to_string(),
        ));
    }

    if let Some(args) = &config.task.args {
        if !args.iter().any(|a| a.contains(ID_PLACEHOLDER)) {
            return Err(ConfigError::ValidationError(format!(
                "task.args must contain the {} placeholder",
                ID_PLACEHOLDER
            )));
        }
    }

    if config.postprocess.embed_thumbnails && config.postprocess.ffmpeg_path.as_os_str().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "postprocess.ffmpeg_path cannot be empty when embed_thumbnails is enabled".to_string(),
        ));
    }

    Ok(())
}
