//! Getting new songs into the catalog, from the network or local disk.

pub mod import;
pub mod job;
pub mod queue;
pub mod sidecar;
pub mod source_url;

pub use import::{import_directory, ImportSummary};
pub use job::{JobContext, JobError};
pub use queue::{CancelError, EnqueueError, IngestionQueue};

/// Default capacity of the ingestion queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 25;
