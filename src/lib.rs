//! Sonohub Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod config;
pub mod events;
pub mod ingestion;
pub mod media;
pub mod renditions;

// Re-export commonly used types for convenience
pub use catalog::{Catalog, CatalogError, Entry, EntryEdit};
pub use config::{Config, FileConfig};
pub use events::{EventBus, LibraryEvent, Observer};
pub use ingestion::{IngestionQueue, JobContext};
pub use renditions::{CoverPreviewCache, RenditionError, TaggedAudioCache};
