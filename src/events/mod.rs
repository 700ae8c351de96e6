//! Library event fan-out to registered observers.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::error;

use crate::catalog::entry::Entry;

/// Something that happened to the library. Events describe state that has
/// already been applied; they are never authoritative themselves.
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    SongAdded { entry: Entry },
    SongEdited { entry: Entry },
    SongDeleted { id: String },
    JobStarted { url: String },
    JobFinished { error: Option<String> },
}

pub trait Observer: Send + Sync {
    fn notify(&self, event: &LibraryEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Registry of observers. Delivery is synchronous and isolated: one
/// observer blowing up does not stop the others from being notified.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    observers: RwLock<HashMap<u64, Arc<dyn Observer>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .write()
            .expect("observers lock poisoned")
            .insert(id, observer);
        SubscriberId(id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.observers
            .write()
            .expect("observers lock poisoned")
            .remove(&id.0);
    }

    pub fn emit(&self, event: LibraryEvent) {
        let observers: Vec<Arc<dyn Observer>> = {
            let guard = self.observers.read().expect("observers lock poisoned");
            guard.values().cloned().collect()
        };
        for observer in observers {
            let result = catch_unwind(AssertUnwindSafe(|| observer.notify(&event)));
            if result.is_err() {
                error!("Observer panicked while handling {:?}", event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers
            .read()
            .expect("observers lock poisoned")
            .len()
    }
}
