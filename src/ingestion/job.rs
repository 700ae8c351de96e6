//! A single ingestion job: fetch, inspect, stage, add to the catalog.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::entry::{AudioSettings, Entry, FileData, PictureData, SyncSettings};
use crate::catalog::{Catalog, CatalogError};
use crate::media::{ArtworkTool, FetchError, Fetcher, MediaProber, ProbeError};

use super::sidecar::Sidecar;

pub(super) const SCRATCH_DIRNAME: &str = "scratch";
const COVER_FILENAME: &str = "cover.jpg";
const FALLBACK_DOMINANT_COLOR: &str = "#ffffff";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job cancelled")]
    Cancelled,

    #[error(transparent)]
    Fetch(FetchError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("audio is only {0:.1}s long, not adding it")]
    TooShort(f64),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a job needs, injected once at queue construction.
pub struct JobContext {
    pub catalog: Arc<Catalog>,
    pub fetcher: Arc<dyn Fetcher>,
    pub prober: Arc<dyn MediaProber>,
    pub artwork: Arc<dyn ArtworkTool>,
    pub library_root: PathBuf,
    pub min_duration: f64,
}

/// Removes the scratch directory unless the job handed it over to the
/// catalog.
pub(super) struct ScratchGuard {
    path: PathBuf,
    armed: bool,
}

impl ScratchGuard {
    pub(super) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(super) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = std::fs::remove_dir_all(&self.path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove scratch dir {:?}: {}", self.path, err);
                }
            }
        }
    }
}

/// Run one ingestion job to completion. Every failure path, including
/// cancellation, leaves no scratch directory and no half-added entry
/// behind.
pub async fn run(
    ctx: &JobContext,
    source: &str,
    cancel: &CancellationToken,
) -> Result<Entry, JobError> {
    // Scratch lives under the library root so the final rename into the
    // songs directory never crosses filesystems.
    let scratch = ctx.library_root.join(SCRATCH_DIRNAME).join(format!(
        "job-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    tokio::fs::create_dir_all(&scratch).await?;
    let mut guard = ScratchGuard::new(scratch.clone());

    let fetched = ctx
        .fetcher
        .fetch(source, &scratch, cancel)
        .await
        .map_err(|err| match err {
            FetchError::Cancelled => JobError::Cancelled,
            other => JobError::Fetch(other),
        })?;

    let probed = ctx.prober.probe(&fetched.audio).await?;
    if probed.duration < ctx.min_duration {
        return Err(JobError::TooShort(probed.duration));
    }

    let sidecar = match &fetched.sidecar {
        Some(path) => Sidecar::load(path).unwrap_or_else(|err| {
            warn!("Could not read sidecar {:?}: {}", path, err);
            Sidecar::default()
        }),
        None => Sidecar::default(),
    };
    let stem = fetched
        .audio
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let music = sidecar.music_data(&probed, &stem);

    let picture = match &fetched.thumbnail {
        Some(thumbnail) => {
            let picture = stage_cover(ctx, thumbnail, &scratch).await;
            let _ = tokio::fs::remove_file(thumbnail).await;
            picture
        }
        None => PictureData::default(),
    };

    let ext = fetched
        .audio
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    let audio_filename = format!("original.{}", ext);
    let audio_dest = scratch.join(&audio_filename);
    if fetched.audio != audio_dest {
        tokio::fs::rename(&fetched.audio, &audio_dest).await?;
    }
    let audio_size = tokio::fs::metadata(&audio_dest).await?.len();

    if cancel.is_cancelled() {
        return Err(JobError::Cancelled);
    }

    let now = Utc::now();
    let entry = ctx.catalog.create_with_id(&scratch, |id| Entry {
        id: id.to_string(),
        source_url: source.to_string(),
        added: now,
        last_edit: now,
        sync: SyncSettings { should: true },
        music,
        audio: AudioSettings::default(),
        picture,
        file: FileData {
            filename: audio_filename,
            size: audio_size,
        },
    })?;
    guard.disarm();

    info!("Added \"{}\" as {}", entry.song_name(), entry.id);
    Ok(entry)
}

/// Crop the fetched thumbnail square, store it in the scratch dir and
/// work out its dominant color. Cover problems degrade to "no cover",
/// they never fail the job.
async fn stage_cover(ctx: &JobContext, thumbnail: &Path, scratch: &Path) -> PictureData {
    let bytes = match tokio::fs::read(thumbnail).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Could not read thumbnail {:?}: {}", thumbnail, err);
            return PictureData::default();
        }
    };
    let jpeg = match ctx.artwork.square_crop(&bytes).await {
        Ok(jpeg) => jpeg,
        Err(err) => {
            warn!("Could not crop thumbnail {:?}: {}", thumbnail, err);
            return PictureData::default();
        }
    };
    let dominant = match ctx.artwork.dominant_color(&jpeg).await {
        Ok(color) => color,
        Err(err) => {
            debug!("No dominant color for {:?}: {}", thumbnail, err);
            FALLBACK_DOMINANT_COLOR.to_string()
        }
    };
    if let Err(err) = tokio::fs::write(scratch.join(COVER_FILENAME), &jpeg).await {
        warn!("Could not stage cover: {}", err);
        return PictureData::default();
    }
    PictureData {
        filename: COVER_FILENAME.to_string(),
        dominant_color_hex: dominant,
        size: jpeg.len() as u64,
    }
}
