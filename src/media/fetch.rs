//! Media acquisition via yt-dlp.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "aac", "opus", "ogg", "oga", "webm", "flac", "wav",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

// yt-dlp exits with 101 when --max-downloads stops it early.
const MAX_DOWNLOADS_EXIT_CODE: i32 = 101;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch cancelled")]
    Cancelled,

    #[error("fetch tool failed: {0}")]
    ToolFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no audio file was produced")]
    NoAudio,
}

/// What a fetch left behind in the scratch directory.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub audio: PathBuf,
    pub thumbnail: Option<PathBuf>,
    pub sidecar: Option<PathBuf>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `source` into `scratch`. Must return promptly with
    /// [`FetchError::Cancelled`] once `cancel` fires, killing whatever
    /// it spawned.
    async fn fetch(
        &self,
        source: &str,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchedMedia, FetchError>;
}

pub struct YtDlpFetcher {
    program: String,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        source: &str,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchedMedia, FetchError> {
        info!("Fetching {}", source);
        let mut child = Command::new(&self.program)
            .args([
                "--write-info-json",
                "--write-thumbnail",
                "-f",
                "bestaudio/best",
                "--max-downloads",
                "1",
                "--no-playlist",
                "-x",
                "-o",
                "song.%(ext)s",
            ])
            .arg(source)
            .current_dir(scratch)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                debug!("Killing fetch of {}", source);
                child.start_kill()?;
                let _ = child.wait().await;
                return Err(FetchError::Cancelled);
            }
        };

        let tolerated = status.success() || status.code() == Some(MAX_DOWNLOADS_EXIT_CODE);
        if !tolerated {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                use tokio::io::AsyncReadExt;
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            return Err(FetchError::ToolFailed(format!(
                "exit status {:?}: {}",
                status.code(),
                stderr.trim()
            )));
        }

        scan_scratch(scratch)
    }
}

/// Whether the path has a recognized audio extension.
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Find the files a fetch produced, by extension.
pub fn scan_scratch(scratch: &Path) -> Result<FetchedMedia, FetchError> {
    let mut audio = None;
    let mut thumbnail = None;
    let mut sidecar = None;

    for dir_entry in std::fs::read_dir(scratch)?.flatten() {
        let path = dir_entry.path();
        let name = dir_entry.file_name().to_string_lossy().to_lowercase();
        if name.ends_with(".info.json") {
            sidecar = Some(path);
            continue;
        }
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            audio = Some(path);
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            thumbnail = Some(path);
        }
    }

    let audio = audio.ok_or(FetchError::NoAudio)?;
    Ok(FetchedMedia {
        audio,
        thumbnail,
        sidecar,
    })
}
