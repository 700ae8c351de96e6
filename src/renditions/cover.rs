//! The in-memory cover preview cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::entry::Entry;
use crate::media::ArtworkTool;

use super::{RenditionCache, RenditionError};

/// Small JPEG previews of cover art, kept in memory and regenerated
/// whenever the underlying entry changes.
pub struct CoverPreviewCache {
    cache: RenditionCache<Arc<Vec<u8>>>,
    artwork: Arc<dyn ArtworkTool>,
    songs_dir: PathBuf,
    edge: u32,
}

impl CoverPreviewCache {
    pub fn new(artwork: Arc<dyn ArtworkTool>, songs_dir: &Path, edge: u32) -> Self {
        Self {
            cache: RenditionCache::new(),
            artwork,
            songs_dir: songs_dir.to_path_buf(),
            edge,
        }
    }

    /// Preview bytes for `entry`, generating them on first use.
    pub async fn get(&self, entry: &Entry) -> Result<Arc<Vec<u8>>, RenditionError> {
        if !entry.has_cover() {
            return Err(RenditionError::NoCover(entry.id.clone()));
        }
        let path = entry
            .cover_path(&self.songs_dir)
            .expect("entry has a cover filename");
        self.cache
            .get_or_build(&entry.id, entry.last_edit, || async {
                debug!("Generating cover preview for {}", entry.id);
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|err| RenditionError::GenerationFailed(err.to_string()))?;
                let preview = self
                    .artwork
                    .thumbnail(&bytes, self.edge)
                    .await
                    .map_err(|err| RenditionError::GenerationFailed(err.to_string()))?;
                Ok(Arc::new(preview))
            })
            .await
    }

    pub fn invalidate(&self, id: &str) {
        self.cache.invalidate(id);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Total bytes held by cached previews.
    pub fn byte_size(&self) -> usize {
        self.cache
            .ready_values()
            .iter()
            .map(|preview| preview.len())
            .sum()
    }

    /// Generate previews for every entry that has a cover. Meant for
    /// startup, so first page loads do not pay the generation cost.
    pub async fn warm_up(&self, entries: &[Entry]) {
        let mut generated = 0usize;
        for entry in entries {
            if !entry.has_cover() {
                continue;
            }
            match self.get(entry).await {
                Ok(_) => generated += 1,
                Err(err) => debug!("Preview warm-up skipped {}: {}", entry.id, err),
            }
        }
        info!(
            "Warmed {} cover previews ({} bytes)",
            generated,
            self.byte_size()
        );
    }
}
