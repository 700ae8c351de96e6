//! Tagged MP3 generation via ffmpeg.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ffmpeg failed: {0}")]
    ConversionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to produce one tagged MP3.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    pub dest: PathBuf,
    /// Trim start in seconds.
    pub start: Option<f64>,
    /// Trim end in seconds.
    pub end: Option<f64>,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    /// JPEG bytes embedded as attached picture.
    pub cover_jpeg: Option<Vec<u8>>,
}

/// An MP3 source is stream-copied instead of re-encoded, trimming and
/// tagging still apply.
fn audio_codec_args(source: &Path) -> &'static [&'static str] {
    let is_mp3 = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
    if is_mp3 {
        &["-codec:a", "copy"]
    } else {
        &["-codec:a", "libmp3lame", "-qscale:a", "2"]
    }
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn write_tagged_mp3(&self, request: TranscodeRequest) -> Result<(), TranscodeError>;
}

pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn write_tagged_mp3(&self, request: TranscodeRequest) -> Result<(), TranscodeError> {
        // Build next to the destination and rename into place, so a
        // half-written file is never served.
        let tmp = request.dest.with_extension("mp3.tmp");

        let mut cmd = Command::new(&self.program);
        cmd.arg("-y");
        cmd.arg("-i").arg(&request.source);

        let has_cover = request.cover_jpeg.is_some();
        if has_cover {
            cmd.args(["-f", "jpeg_pipe", "-i", "pipe:0"]);
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        if let Some(start) = request.start {
            cmd.args(["-ss", &format!("{}", start)]);
        }
        if let Some(end) = request.end {
            cmd.args(["-to", &format!("{}", end)]);
        }

        cmd.args(["-map", "0:a"]);
        if has_cover {
            cmd.args(["-map", "1:0", "-c:v", "copy", "-disposition:v:0", "attached_pic"]);
        }
        cmd.args(audio_codec_args(&request.source));
        cmd.args(["-id3v2_version", "3", "-write_xing", "0"]);
        cmd.arg("-metadata").arg(format!("title={}", request.title));
        cmd.arg("-metadata").arg(format!("artist={}", request.artist));
        cmd.arg("-metadata").arg(format!("album={}", request.album));
        if let Some(year) = request.year {
            cmd.arg("-metadata").arg(format!("date={}", year));
        }
        cmd.args(["-f", "mp3"]);
        cmd.arg(&tmp);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        debug!("Generating tagged mp3 at {:?}", request.dest);
        let mut child = cmd.spawn()?;

        if let Some(cover) = request.cover_jpeg {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                TranscodeError::ConversionFailed("could not open ffmpeg stdin".to_string())
            })?;
            tokio::spawn(async move {
                let _ = stdin.write_all(&cover).await;
                let _ = stdin.shutdown().await;
            });
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&tmp).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::ConversionFailed(stderr.to_string()));
        }

        tokio::fs::rename(&tmp, &request.dest).await?;
        Ok(())
    }
}
