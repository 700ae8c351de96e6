//! File configuration, overlaid onto built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingestion::DEFAULT_QUEUE_CAPACITY;

/// Effective settings after merging defaults and the config file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the catalog file and the songs directory.
    pub library_root: PathBuf,
    pub queue_capacity: usize,
    /// Fetched audio shorter than this is rejected, in seconds.
    pub min_duration_secs: f64,
    /// Edge length of generated cover previews, in pixels.
    pub cover_preview_edge: u32,
    /// Days to keep generated renditions; negative disables pruning.
    pub keep_generated_days: i64,
    /// Generate all cover previews at startup.
    pub warm_covers_on_start: bool,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub ytdlp: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_root: PathBuf::from("data"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            min_duration_secs: 1.0,
            cover_preview_edge: 120,
            keep_generated_days: -1,
            warm_covers_on_start: false,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            ytdlp: "yt-dlp".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub library_root: Option<String>,
    pub queue_capacity: Option<usize>,
    pub min_duration_secs: Option<f64>,
    pub cover_preview_edge: Option<u32>,
    pub keep_generated_days: Option<i64>,
    pub warm_covers_on_start: Option<bool>,

    pub tools: Option<ToolsConfig>,
}

/// Overrides for the external tool binaries.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub ytdlp: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn into_config(self) -> Config {
        let defaults = Config::default();
        let tools = self.tools.unwrap_or_default();
        Config {
            library_root: self
                .library_root
                .map(PathBuf::from)
                .unwrap_or(defaults.library_root),
            queue_capacity: self.queue_capacity.unwrap_or(defaults.queue_capacity),
            min_duration_secs: self.min_duration_secs.unwrap_or(defaults.min_duration_secs),
            cover_preview_edge: self
                .cover_preview_edge
                .unwrap_or(defaults.cover_preview_edge),
            keep_generated_days: self
                .keep_generated_days
                .unwrap_or(defaults.keep_generated_days),
            warm_covers_on_start: self
                .warm_covers_on_start
                .unwrap_or(defaults.warm_covers_on_start),
            ffmpeg: tools.ffmpeg.unwrap_or(defaults.ffmpeg),
            ffprobe: tools.ffprobe.unwrap_or(defaults.ffprobe),
            ytdlp: tools.ytdlp.unwrap_or(defaults.ytdlp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_config_gives_defaults() {
        let config = FileConfig::default().into_config();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.cover_preview_edge, 120);
        assert_eq!(config.ffmpeg, "ffmpeg");
        assert_eq!(config.keep_generated_days, -1);
    }

    #[test]
    fn test_partial_file_overrides_only_named_fields() {
        let parsed: FileConfig = toml::from_str(
            r#"
            library_root = "/srv/music"
            keep_generated_days = 30

            [tools]
            ytdlp = "/usr/local/bin/yt-dlp"
            "#,
        )
        .unwrap();
        let config = parsed.into_config();
        assert_eq!(config.library_root, PathBuf::from("/srv/music"));
        assert_eq!(config.keep_generated_days, 30);
        assert_eq!(config.ytdlp, "/usr/local/bin/yt-dlp");
        // Untouched fields keep their defaults.
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.ffprobe, "ffprobe");
    }
}
