//! Audio inspection via ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// Duration and whatever tags the container carries.
#[derive(Debug, Clone, Default)]
pub struct ProbedMedia {
    /// Duration in seconds.
    pub duration: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
}

#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbedMedia, ProbeError>;
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
}

#[derive(Debug, Deserialize, Default)]
struct FfprobeTags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    date: Option<String>,
}

pub struct FfprobeProber {
    program: String,
}

impl FfprobeProber {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbedMedia, ProbeError> {
        let output = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ProbeFailed(stderr.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let probe: FfprobeOutput = serde_json::from_str(&stdout)
            .map_err(|e| ProbeError::InvalidOutput(format!("JSON parse error: {}", e)))?;

        let duration: f64 = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0);

        let tags = probe.format.tags.unwrap_or_default();
        Ok(ProbedMedia {
            duration,
            title: tags.title,
            artist: tags.artist,
            album: tags.album,
            year: tags.date.as_deref().and_then(parse_year),
        })
    }
}

/// Pull a year out of tag values like "2003", "2003-05-12" or "20030512".
fn parse_year(date: &str) -> Option<i32> {
    let head: String = date.chars().take(4).collect();
    if head.len() < 4 {
        return None;
    }
    head.parse().ok()
}
