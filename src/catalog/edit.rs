//! Field-level edits applied to catalog entries.

use serde::Deserialize;

use super::entry::Entry;
use super::CatalogError;

/// A partial update of an entry. Absent fields are left untouched.
///
/// `year` is doubly optional: `None` leaves the year alone, `Some(None)`
/// clears it.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EntryEdit {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<Option<i32>>,
    pub trim_start: Option<f64>,
    pub trim_end: Option<f64>,
    pub sync: Option<bool>,
    /// Set when the caller replaced the cover art on disk; forces a save
    /// and an edit event even if no field changed.
    #[serde(skip)]
    pub replaced_cover: bool,
}

impl EntryEdit {
    /// Apply the edit to a copy of `entry`. Returns `None` when the edit
    /// is a no-op, so callers can skip the save and the event.
    pub fn apply_to(&self, entry: &Entry) -> Result<Option<Entry>, CatalogError> {
        let mut updated = entry.clone();

        if let Some(title) = &self.title {
            updated.music.title = title.clone();
        }
        if let Some(artist) = &self.artist {
            updated.music.artist = artist.clone();
        }
        if let Some(album) = &self.album {
            updated.music.album = album.clone();
        }
        if let Some(year) = self.year {
            updated.music.year = year;
        }
        if let Some(start) = self.trim_start {
            updated.audio.start = normalize_trim(start);
        }
        if let Some(end) = self.trim_end {
            updated.audio.end = normalize_trim(end);
        }
        if let Some(sync) = self.sync {
            updated.sync.should = sync;
        }

        if updated.audio.start_set()
            && updated.audio.end_set()
            && updated.audio.start == updated.audio.end
        {
            return Err(CatalogError::InvalidEdit(
                "trim start and end are the same".to_string(),
            ));
        }
        // A reversed pair is accepted and swapped.
        if updated.audio.start_set()
            && updated.audio.end_set()
            && updated.audio.start > updated.audio.end
        {
            std::mem::swap(&mut updated.audio.start, &mut updated.audio.end);
        }

        if updated == *entry && !self.replaced_cover {
            return Ok(None);
        }
        Ok(Some(updated))
    }
}

fn normalize_trim(value: f64) -> f64 {
    if value < 0.0 {
        super::entry::TRIM_UNSET
    } else {
        value
    }
}
