//! Cover art manipulation via ffmpeg.
//!
//! Images flow through as byte buffers on stdin/stdout, nothing touches
//! the filesystem here.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("ffmpeg failed: {0}")]
    ToolFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

#[async_trait]
pub trait ArtworkTool: Send + Sync {
    /// Center-crop to a square and re-encode as JPEG.
    async fn square_crop(&self, image: &[u8]) -> Result<Vec<u8>, ArtworkError>;

    /// Scale down to fit within `edge` pixels, keeping aspect ratio,
    /// and re-encode as JPEG.
    async fn thumbnail(&self, image: &[u8], edge: u32) -> Result<Vec<u8>, ArtworkError>;

    /// Dominant color of the image as "#rrggbb".
    async fn dominant_color(&self, image: &[u8]) -> Result<String, ArtworkError>;

    /// Extract embedded cover art from an audio file, if any.
    async fn extract_embedded_art(&self, audio: &Path) -> Result<Option<Vec<u8>>, ArtworkError>;
}

pub struct FfmpegArtwork {
    program: String,
}

impl FfmpegArtwork {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run_filter(&self, image: &[u8], extra: &[&str]) -> Result<Vec<u8>, ArtworkError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-i", "pipe:0"]);
        cmd.args(extra);
        cmd.arg("pipe:1");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            ArtworkError::ToolFailed("could not open ffmpeg stdin".to_string())
        })?;
        let input = image.to_vec();
        tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        });

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArtworkError::ToolFailed(stderr.to_string()));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ArtworkTool for FfmpegArtwork {
    async fn square_crop(&self, image: &[u8]) -> Result<Vec<u8>, ArtworkError> {
        self.run_filter(
            image,
            &[
                "-vf",
                "crop='min(iw,ih)':'min(iw,ih)'",
                "-frames:v",
                "1",
                "-f",
                "mjpeg",
            ],
        )
        .await
    }

    async fn thumbnail(&self, image: &[u8], edge: u32) -> Result<Vec<u8>, ArtworkError> {
        let filter = format!(
            "scale={edge}:{edge}:force_original_aspect_ratio=decrease:flags=lanczos"
        );
        self.run_filter(image, &["-vf", &filter, "-frames:v", "1", "-f", "mjpeg"])
            .await
    }

    async fn dominant_color(&self, image: &[u8]) -> Result<String, ArtworkError> {
        // Averaging the whole image down to a single pixel gives a good
        // enough dominant color for backgrounds.
        let pixel = self
            .run_filter(
                image,
                &[
                    "-vf",
                    "scale=1:1",
                    "-frames:v",
                    "1",
                    "-f",
                    "rawvideo",
                    "-pix_fmt",
                    "rgb24",
                ],
            )
            .await?;
        if pixel.len() < 3 {
            return Err(ArtworkError::InvalidOutput(format!(
                "expected 3 rgb bytes, got {}",
                pixel.len()
            )));
        }
        Ok(format!("#{:02x}{:02x}{:02x}", pixel[0], pixel[1], pixel[2]))
    }

    async fn extract_embedded_art(&self, audio: &Path) -> Result<Option<Vec<u8>>, ArtworkError> {
        let output = Command::new(&self.program)
            .arg("-i")
            .arg(audio)
            .args(["-an", "-codec:v", "copy", "-f", "mjpeg", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await?;

        // Audio without an attached picture makes ffmpeg fail; that is
        // an absent cover, not an error.
        if !output.status.success() || output.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }
}
