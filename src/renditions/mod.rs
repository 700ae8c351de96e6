//! Derived-artifact caches with per-key single-flight regeneration.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;

pub mod audio;
pub mod cover;

pub use audio::TaggedAudioCache;
pub use cover::CoverPreviewCache;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenditionError {
    #[error("no entry with id {0}")]
    NotFound(String),

    #[error("entry {0} has no cover art")]
    NoCover(String),

    #[error("failed to generate rendition: {0}")]
    GenerationFailed(String),
}

type BuildResult<T> = Result<T, RenditionError>;

struct Cached<T> {
    value: T,
    last_edit: DateTime<Utc>,
}

/// An in-flight build and the `lastEdit` it was started for.
struct Flight<T> {
    last_edit: DateTime<Utc>,
    rx: watch::Receiver<Option<BuildResult<T>>>,
}

enum Role<T> {
    Wait {
        rx: watch::Receiver<Option<BuildResult<T>>>,
        /// Whether the flight was started for our `lastEdit`. A flight
        /// for a different edit state is only waited out, never adopted.
        adopt: bool,
    },
    Lead(watch::Sender<Option<BuildResult<T>>>),
}

/// Cache of values derived from catalog entries.
///
/// A cached value is valid only for the `lastEdit` it was built against;
/// any other timestamp means rebuild. At most one build per key runs at a
/// time: concurrent callers for the same key wait on the in-flight build
/// and share its outcome, errors included. Errors are never cached.
pub struct RenditionCache<T: Clone> {
    state: Mutex<CacheState<T>>,
}

struct CacheState<T> {
    ready: HashMap<String, Cached<T>>,
    in_flight: HashMap<String, Flight<T>>,
}

impl<T: Clone> Default for RenditionCache<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                ready: HashMap::new(),
                in_flight: HashMap::new(),
            }),
        }
    }
}

impl<T: Clone> RenditionCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `id` at `last_edit`, or run `build`
    /// to produce it. While a build is in flight, further callers for
    /// the same id wait on it instead of starting their own.
    pub async fn get_or_build<F, Fut>(
        &self,
        id: &str,
        last_edit: DateTime<Utc>,
        build: F,
    ) -> BuildResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BuildResult<T>>,
    {
        let mut build = Some(build);
        loop {
            let role = {
                let mut state = self.state.lock().expect("cache lock poisoned");
                if let Some(cached) = state.ready.get(id) {
                    if cached.last_edit == last_edit {
                        return Ok(cached.value.clone());
                    }
                }
                match state.in_flight.get(id) {
                    Some(flight) => Role::Wait {
                        rx: flight.rx.clone(),
                        adopt: flight.last_edit == last_edit,
                    },
                    None => {
                        let (tx, rx) = watch::channel(None);
                        state.in_flight.insert(id.to_string(), Flight { last_edit, rx });
                        Role::Lead(tx)
                    }
                }
            };

            match role {
                Role::Wait { mut rx, adopt } => {
                    let result = loop {
                        if let Some(result) = rx.borrow_and_update().clone() {
                            break result;
                        }
                        if rx.changed().await.is_err() {
                            break Err(RenditionError::GenerationFailed(
                                "generation was abandoned".to_string(),
                            ));
                        }
                    };
                    if adopt {
                        return result;
                    }
                    // The flight was building for a different lastEdit; its
                    // result is no good to us. Check the maps again now that
                    // the key is free.
                }
                Role::Lead(tx) => {
                    let build = build.take().expect("a leader runs once per call");
                    let result = build().await;
                    {
                        let mut state = self.state.lock().expect("cache lock poisoned");
                        state.in_flight.remove(id);
                        if let Ok(value) = &result {
                            state.ready.insert(
                                id.to_string(),
                                Cached {
                                    value: value.clone(),
                                    last_edit,
                                },
                            );
                        }
                    }
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// Drop the cached value for `id`, if any.
    pub fn invalidate(&self, id: &str) {
        self.state
            .lock()
            .expect("cache lock poisoned")
            .ready
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("cache lock poisoned").ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all cached values.
    pub fn ready_values(&self) -> Vec<T> {
        self.state
            .lock()
            .expect("cache lock poisoned")
            .ready
            .values()
            .map(|cached| cached.value.clone())
            .collect()
    }
}
