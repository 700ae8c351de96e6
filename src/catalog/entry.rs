//! The catalog entry model and its on-disk layout helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source URL sentinel for entries that were imported from local files
/// rather than fetched from the network.
pub const IMPORT_SOURCE: &str = "Import";

/// Trim points use a negative value to mean "not set".
pub const TRIM_UNSET: f64 = -1.0;

/// Filename of the tagged MP3 rendition inside an entry's directory.
pub const RENDITION_FILENAME: &str = "latest.mp3";

/// A single song in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    pub added: DateTime<Utc>,
    pub last_edit: DateTime<Utc>,
    pub sync: SyncSettings,
    pub music: MusicData,
    pub audio: AudioSettings,
    pub picture: PictureData,
    pub file: FileData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    pub should: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicData {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    /// Duration of the source audio in seconds.
    pub duration: f64,
}

/// Trim points applied when generating the tagged rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    pub start: f64,
    pub end: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            start: TRIM_UNSET,
            end: TRIM_UNSET,
        }
    }
}

impl AudioSettings {
    pub fn start_set(&self) -> bool {
        self.start >= 0.0
    }

    pub fn end_set(&self) -> bool {
        self.end >= 0.0
    }
}

/// Cover art stored alongside the audio file. An empty filename means the
/// entry has no cover.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureData {
    pub filename: String,
    #[serde(rename = "dominantColorHEX")]
    pub dominant_color_hex: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub filename: String,
    pub size: u64,
}

impl Entry {
    /// Directory holding this entry's files, under the library's songs dir.
    pub fn dir_path(&self, songs_dir: &Path) -> PathBuf {
        songs_dir.join(&self.id)
    }

    /// Path of the source audio file.
    pub fn audio_path(&self, songs_dir: &Path) -> PathBuf {
        self.dir_path(songs_dir).join(&self.file.filename)
    }

    /// Path of the cover art, if the entry has one.
    pub fn cover_path(&self, songs_dir: &Path) -> Option<PathBuf> {
        if self.picture.filename.is_empty() {
            return None;
        }
        Some(self.dir_path(songs_dir).join(&self.picture.filename))
    }

    /// Path of the tagged MP3 rendition.
    pub fn rendition_path(&self, songs_dir: &Path) -> PathBuf {
        self.dir_path(songs_dir).join(RENDITION_FILENAME)
    }

    /// Display name, "Artist - Title" when both are known.
    pub fn song_name(&self) -> String {
        match (
            self.music.artist.is_empty(),
            self.music.title.is_empty(),
        ) {
            (false, false) => format!("{} - {}", self.music.artist, self.music.title),
            (true, false) => self.music.title.clone(),
            _ => self.file.filename.clone(),
        }
    }

    pub fn is_imported(&self) -> bool {
        self.source_url == IMPORT_SOURCE
    }

    pub fn has_cover(&self) -> bool {
        !self.picture.filename.is_empty()
    }
}
