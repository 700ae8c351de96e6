//! The metadata sidecar written by the fetch tool, and the cascade that
//! turns it into catalog music data.

use serde::Deserialize;
use std::path::Path;

use crate::catalog::entry::MusicData;
use crate::media::ProbedMedia;

const UPLOADER_TOPIC_SUFFIX: &str = " - Topic";

/// The fields we care about from a `*.info.json` sidecar. Everything
/// else in the file is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct Sidecar {
    pub track: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub creator: Option<String>,
    pub uploader: Option<String>,
    pub album: Option<String>,
    pub playlist: Option<String>,
    pub playlist_title: Option<String>,
    pub release_year: Option<i32>,
    pub release_date: Option<String>,
    pub upload_date: Option<String>,
}

impl Sidecar {
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read(path)?;
        serde_json::from_slice(&raw).map_err(std::io::Error::other)
    }

    /// Merge sidecar fields, probed tags and the filename into music
    /// data. Sidecar fields win, probed tags fill the gaps, the
    /// filename is the last resort for the title.
    pub fn music_data(&self, probed: &ProbedMedia, filename_stem: &str) -> MusicData {
        let title = self
            .track
            .clone()
            .or_else(|| self.title.clone())
            .or_else(|| probed.title.clone())
            .unwrap_or_else(|| filename_stem.to_string());

        let artist = self
            .artist
            .clone()
            .or_else(|| self.creator.clone())
            .or_else(|| {
                self.uploader
                    .as_ref()
                    .map(|u| u.trim_end_matches(UPLOADER_TOPIC_SUFFIX).to_string())
            })
            .or_else(|| probed.artist.clone())
            .unwrap_or_default();

        let album = self
            .album
            .clone()
            .or_else(|| self.playlist.clone())
            .or_else(|| self.playlist_title.clone())
            .or_else(|| probed.album.clone())
            .unwrap_or_default();

        let year = self
            .release_year
            .or_else(|| self.release_date.as_deref().and_then(year_of))
            .or_else(|| self.upload_date.as_deref().and_then(year_of))
            .or(probed.year);

        let (title, artist) = apply_featured(title, artist);
        MusicData {
            title,
            artist,
            album,
            year,
            duration: probed.duration,
        }
    }
}

/// Years come as "2007", "2007-03-01" or "20070301".
fn year_of(date: &str) -> Option<i32> {
    let head: String = date.chars().take(4).collect();
    if head.len() < 4 {
        return None;
    }
    head.parse().ok()
}

/// Split a combined artist credit and move the secondary artists into a
/// "(feat. …)" suffix on the title.
fn apply_featured(title: String, raw_artist: String) -> (String, String) {
    let artists: Vec<&str> = raw_artist
        .split([',', '&', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if artists.len() <= 1 {
        return (title, raw_artist.trim().to_string());
    }
    let lead = artists[0].to_string();
    if title.to_lowercase().contains("feat") {
        return (title, lead);
    }
    let featured = artists[1..].join(" & ");
    (format!("{} (feat. {})", title, featured), lead)
}
