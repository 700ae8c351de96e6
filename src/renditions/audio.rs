//! The tagged MP3 cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::entry::Entry;
use crate::media::{ArtworkTool, TranscodeRequest, Transcoder};

use super::{RenditionCache, RenditionError};

/// Caches the path of each entry's generated `latest.mp3`. The file
/// itself lives in the entry's directory; the cache remembers which
/// `lastEdit` it was built for, so an edited entry gets a fresh one.
pub struct TaggedAudioCache {
    cache: RenditionCache<PathBuf>,
    transcoder: Arc<dyn Transcoder>,
    artwork: Arc<dyn ArtworkTool>,
    songs_dir: PathBuf,
}

impl TaggedAudioCache {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        artwork: Arc<dyn ArtworkTool>,
        songs_dir: &Path,
    ) -> Self {
        Self {
            cache: RenditionCache::new(),
            transcoder,
            artwork,
            songs_dir: songs_dir.to_path_buf(),
        }
    }

    /// Path of the tagged MP3 for `entry`, generating it if the cached
    /// one is missing or predates the entry's last edit.
    pub async fn get(&self, entry: &Entry) -> Result<PathBuf, RenditionError> {
        let dest = entry.rendition_path(&self.songs_dir);
        self.cache
            .get_or_build(&entry.id, entry.last_edit, || async {
                debug!("Generating tagged mp3 for {}", entry.id);
                let cover_jpeg = self.load_cover_jpeg(entry).await;
                let request = TranscodeRequest {
                    source: entry.audio_path(&self.songs_dir),
                    dest: dest.clone(),
                    start: entry.audio.start_set().then_some(entry.audio.start),
                    end: entry.audio.end_set().then_some(entry.audio.end),
                    title: entry.music.title.clone(),
                    artist: entry.music.artist.clone(),
                    album: entry.music.album.clone(),
                    year: entry.music.year,
                    cover_jpeg,
                };
                self.transcoder
                    .write_tagged_mp3(request)
                    .await
                    .map_err(|err| RenditionError::GenerationFailed(err.to_string()))?;
                Ok(dest.clone())
            })
            .await
    }

    pub fn invalidate(&self, id: &str) {
        self.cache.invalidate(id);
    }

    /// Cover bytes re-encoded as JPEG for embedding. A broken cover
    /// downgrades to an untagged picture, not a failed rendition.
    async fn load_cover_jpeg(&self, entry: &Entry) -> Option<Vec<u8>> {
        let path = entry.cover_path(&self.songs_dir)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Could not read cover of {}: {}", entry.id, err);
                return None;
            }
        };
        match self.artwork.square_crop(&bytes).await {
            Ok(jpeg) => Some(jpeg),
            Err(err) => {
                warn!("Could not prepare cover of {}: {}", entry.id, err);
                None
            }
        }
    }
}
