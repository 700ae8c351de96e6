//! The catalog: an in-memory map of entries, mirrored to a JSON file.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

pub mod cleanup;
pub mod edit;
pub mod entry;
pub mod ids;
pub mod persistence;

pub use edit::EntryEdit;
pub use entry::Entry;

use crate::events::{EventBus, LibraryEvent};
use persistence::PersistenceError;

const CATALOG_FILENAME: &str = "catalog.json";
const SONGS_DIRNAME: &str = "songs";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("an entry with id {0} already exists")]
    DuplicateId(String),

    #[error("no entry with id {0}")]
    NotFound(String),

    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    #[error("failed to persist catalog: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The record store. All mutations go through a single write lock that
/// also covers id allocation and the save to disk, so concurrent writers
/// can never race an id or interleave persisted states.
pub struct Catalog {
    songs_dir: PathBuf,
    catalog_file: PathBuf,
    entries: RwLock<HashMap<String, Entry>>,
    events: Arc<EventBus>,
}

impl Catalog {
    /// Open the catalog rooted at `library_root`, creating the directory
    /// layout on first run. A missing catalog file means an empty
    /// catalog; a corrupt one is a startup error.
    pub fn open(library_root: &Path, events: Arc<EventBus>) -> Result<Self, CatalogError> {
        let songs_dir = library_root.join(SONGS_DIRNAME);
        fs::create_dir_all(&songs_dir)?;

        let catalog_file = library_root.join(CATALOG_FILENAME);
        let entries = persistence::load(&catalog_file)?;
        info!("Loaded {} catalog entries from {:?}", entries.len(), catalog_file);

        Ok(Self {
            songs_dir,
            catalog_file,
            entries: RwLock::new(entries),
            events,
        })
    }

    pub fn songs_dir(&self) -> &Path {
        &self.songs_dir
    }

    pub fn get(&self, id: &str) -> Option<Entry> {
        self.entries
            .read()
            .expect("catalog lock poisoned")
            .get(id)
            .cloned()
    }

    /// Point-in-time snapshot of every entry.
    pub fn all_entries(&self) -> Vec<Entry> {
        self.entries
            .read()
            .expect("catalog lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an entry whose id was assigned elsewhere.
    pub fn add(&self, entry: Entry) -> Result<(), CatalogError> {
        {
            let mut entries = self.entries.write().expect("catalog lock poisoned");
            if entries.contains_key(&entry.id) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
            entries.insert(entry.id.clone(), entry.clone());
            persistence::save(&self.catalog_file, &entries)?;
        }
        self.events.emit(LibraryEvent::SongAdded { entry });
        Ok(())
    }

    /// Allocate a fresh id, move `staged_dir` into place as the entry's
    /// directory, and insert the entry `build` produces for that id. The
    /// whole sequence runs under one write lock, so the allocated id
    /// cannot be claimed by a concurrent writer in between.
    ///
    /// `staged_dir` must live on the same filesystem as the library.
    pub fn create_with_id<F>(&self, staged_dir: &Path, build: F) -> Result<Entry, CatalogError>
    where
        F: FnOnce(&str) -> Entry,
    {
        let entry = {
            let mut entries = self.entries.write().expect("catalog lock poisoned");
            let id = ids::generate_id(|candidate| entries.contains_key(candidate));

            let dir = self.songs_dir.join(&id);
            fs::rename(staged_dir, &dir)?;

            let mut entry = build(&id);
            entry.id = id.clone();
            entries.insert(id, entry.clone());

            if let Err(err) = persistence::save(&self.catalog_file, &entries) {
                // The entry stays in memory; the next successful save
                // will pick it up.
                warn!("Catalog save failed after adding {}: {}", entry.id, err);
                return Err(err.into());
            }
            entry
        };
        self.events.emit(LibraryEvent::SongAdded {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    /// Apply a field-level edit. A no-op edit leaves `lastEdit` alone,
    /// saves nothing and emits nothing.
    pub fn update(&self, id: &str, edit: &EntryEdit) -> Result<Entry, CatalogError> {
        let updated = {
            let mut entries = self.entries.write().expect("catalog lock poisoned");
            let current = entries
                .get(id)
                .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

            let Some(mut updated) = edit.apply_to(current)? else {
                return Ok(current.clone());
            };
            updated.last_edit = chrono::Utc::now();
            entries.insert(id.to_string(), updated.clone());
            persistence::save(&self.catalog_file, &entries)?;
            updated
        };
        self.events.emit(LibraryEvent::SongEdited {
            entry: updated.clone(),
        });
        Ok(updated)
    }

    /// Remove an entry and its directory. A directory that is already
    /// gone is fine; any other filesystem failure aborts the delete
    /// before the in-memory state is touched.
    pub fn delete(&self, id: &str) -> Result<(), CatalogError> {
        {
            let mut entries = self.entries.write().expect("catalog lock poisoned");
            if !entries.contains_key(id) {
                return Err(CatalogError::NotFound(id.to_string()));
            }

            let dir = self.songs_dir.join(id);
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }

            entries.remove(id);
            persistence::save(&self.catalog_file, &entries)?;
        }
        self.events.emit(LibraryEvent::SongDeleted { id: id.to_string() });
        Ok(())
    }

    /// Startup sweep: drop directories no entry claims and prune old
    /// renditions.
    pub fn startup_cleanup(&self, keep_generated_days: i64) {
        let known: std::collections::HashSet<String> = {
            let entries = self.entries.read().expect("catalog lock poisoned");
            entries.keys().cloned().collect()
        };
        let orphans = cleanup::remove_orphan_dirs(&self.songs_dir, &known);
        let pruned = cleanup::prune_renditions(&self.songs_dir, keep_generated_days);
        if orphans > 0 || pruned > 0 {
            info!(
                "Cleanup removed {} orphan directories and {} old renditions",
                orphans, pruned
            );
        }
    }
}
