//! Importing audio files already on local disk.

use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::entry::{
    AudioSettings, Entry, FileData, PictureData, SyncSettings, IMPORT_SOURCE,
};
use crate::media::fetch::is_audio_path;

use super::job::{JobContext, JobError, ScratchGuard, SCRATCH_DIRNAME};

const COVER_FILENAME: &str = "cover.jpg";

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Walk `dir` and add every playable audio file to the catalog. Files
/// that cannot be imported are logged and skipped, they never abort the
/// rest of the walk.
pub async fn import_directory(ctx: &JobContext, dir: &Path) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for walked in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !walked.file_type().is_file() || !is_audio_path(walked.path()) {
            continue;
        }
        match import_one(ctx, walked.path()).await {
            Ok(entry) => {
                info!("Imported \"{}\" as {}", entry.song_name(), entry.id);
                summary.imported += 1;
            }
            Err(err) => {
                warn!("Skipping {:?}: {}", walked.path(), err);
                summary.skipped += 1;
            }
        }
    }
    info!(
        "Import finished: {} added, {} skipped",
        summary.imported, summary.skipped
    );
    summary
}

async fn import_one(ctx: &JobContext, path: &Path) -> Result<Entry, JobError> {
    let scratch = ctx.library_root.join(SCRATCH_DIRNAME).join(format!(
        "import-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    tokio::fs::create_dir_all(&scratch).await?;
    let mut guard = ScratchGuard::new(scratch.clone());

    let probed = ctx.prober.probe(path).await?;
    if probed.duration < ctx.min_duration {
        return Err(JobError::TooShort(probed.duration));
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    let audio_filename = format!("original.{}", ext);
    tokio::fs::copy(path, scratch.join(&audio_filename)).await?;
    let audio_size = tokio::fs::metadata(scratch.join(&audio_filename)).await?.len();

    let picture = stage_embedded_cover(ctx, path, &scratch).await;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let title = probed.title.clone().unwrap_or(stem);
    let artist = probed.artist.clone().unwrap_or_default();
    let album = probed.album.clone().unwrap_or_default();

    let now = Utc::now();
    let entry = ctx.catalog.create_with_id(&scratch, |id| Entry {
        id: id.to_string(),
        source_url: IMPORT_SOURCE.to_string(),
        added: now,
        last_edit: now,
        sync: SyncSettings { should: false },
        music: crate::catalog::entry::MusicData {
            title,
            artist,
            album,
            year: probed.year,
            duration: probed.duration,
        },
        audio: AudioSettings::default(),
        picture,
        file: FileData {
            filename: audio_filename,
            size: audio_size,
        },
    })?;
    // The staged directory is now owned by the catalog.
    guard.disarm();
    Ok(entry)
}

/// Pull cover art embedded in the audio file, if there is any.
async fn stage_embedded_cover(ctx: &JobContext, audio: &Path, scratch: &Path) -> PictureData {
    let art = match ctx.artwork.extract_embedded_art(audio).await {
        Ok(Some(art)) => art,
        Ok(None) => return PictureData::default(),
        Err(err) => {
            warn!("Could not extract cover from {:?}: {}", audio, err);
            return PictureData::default();
        }
    };
    let jpeg = match ctx.artwork.square_crop(&art).await {
        Ok(jpeg) => jpeg,
        Err(err) => {
            warn!("Could not crop cover from {:?}: {}", audio, err);
            return PictureData::default();
        }
    };
    let dominant = ctx
        .artwork
        .dominant_color(&jpeg)
        .await
        .unwrap_or_else(|_| "#ffffff".to_string());
    if tokio::fs::write(scratch.join(COVER_FILENAME), &jpeg).await.is_err() {
        return PictureData::default();
    }
    PictureData {
        filename: COVER_FILENAME.to_string(),
        dominant_color_hex: dominant,
        size: jpeg.len() as u64,
    }
}
