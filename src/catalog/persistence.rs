//! Atomic JSON persistence of the catalog file.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::entry::Entry;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed catalog file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Load the catalog file. A missing file is an empty catalog; anything
/// else that goes wrong is reported to the caller.
pub fn load(path: &Path) -> Result<HashMap<String, Entry>, PersistenceError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("No catalog file at {:?}, starting empty", path);
            return Ok(HashMap::new());
        }
        Err(err) => return Err(err.into()),
    };
    let entries: HashMap<String, Entry> = serde_json::from_slice(&raw)?;
    Ok(entries)
}

/// Write the whole catalog to disk. The document is serialized next to the
/// target and renamed over it, so readers never observe a partial file.
pub fn save(path: &Path, entries: &HashMap<String, Entry>) -> Result<(), PersistenceError> {
    // Stable key order keeps diffs between saves readable.
    let ordered: BTreeMap<&String, &Entry> = entries.iter().collect();

    let mut buf = Vec::with_capacity(4096);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    ordered.serialize(&mut serializer)?;
    buf.push(b'\n');

    let tmp = tmp_path(path);
    fs::write(&tmp, &buf)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
