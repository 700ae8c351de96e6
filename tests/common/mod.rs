//! Common test infrastructure
//!
//! Fake media collaborators and a sandboxed library, so integration
//! tests exercise the catalog, queue and caches without any external
//! tools.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use sonohub::catalog::entry::{
    AudioSettings, Entry, FileData, MusicData, PictureData, SyncSettings,
};
use sonohub::catalog::Catalog;
use sonohub::events::{EventBus, LibraryEvent, Observer};
use sonohub::ingestion::JobContext;
use sonohub::media::{
    ArtworkError, ArtworkTool, FetchError, FetchedMedia, Fetcher, MediaProber, ProbeError,
    ProbedMedia, TranscodeError, TranscodeRequest, Transcoder,
};

// ====== Library sandbox ======

pub struct TestLibrary {
    pub root: tempfile::TempDir,
    pub events: Arc<EventBus>,
    pub catalog: Arc<Catalog>,
}

impl TestLibrary {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let events = Arc::new(EventBus::new());
        let catalog = Arc::new(Catalog::open(root.path(), events.clone()).unwrap());
        Self {
            root,
            events,
            catalog,
        }
    }

    /// Insert an entry together with its directory and audio file.
    pub fn add_entry(&self, id: &str, source: &str) -> Entry {
        let entry = make_entry(id, source);
        let dir = self.catalog.songs_dir().join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(&entry.file.filename), b"audio bytes").unwrap();
        self.catalog.add(entry.clone()).unwrap();
        entry
    }

    /// Like [`add_entry`], with a cover file on disk as well.
    pub fn add_entry_with_cover(&self, id: &str, source: &str) -> Entry {
        let mut entry = make_entry(id, source);
        entry.picture = PictureData {
            filename: "cover.jpg".to_string(),
            dominant_color_hex: "#101010".to_string(),
            size: 11,
        };
        let dir = self.catalog.songs_dir().join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(&entry.file.filename), b"audio bytes").unwrap();
        std::fs::write(dir.join("cover.jpg"), b"cover bytes").unwrap();
        self.catalog.add(entry.clone()).unwrap();
        entry
    }
}

pub fn make_entry(id: &str, source: &str) -> Entry {
    Entry {
        id: id.to_string(),
        source_url: source.to_string(),
        added: chrono::Utc::now(),
        last_edit: chrono::Utc::now(),
        sync: SyncSettings { should: true },
        music: MusicData {
            title: format!("Title {}", id),
            artist: "Artist".to_string(),
            album: String::new(),
            year: None,
            duration: 180.0,
        },
        audio: AudioSettings::default(),
        picture: PictureData::default(),
        file: FileData {
            filename: "original.m4a".to_string(),
            size: 11,
        },
    }
}

// ====== Event collection ======

struct EventCollector {
    tx: UnboundedSender<LibraryEvent>,
}

impl Observer for EventCollector {
    fn notify(&self, event: &LibraryEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Subscribe a collector and return the receiving end.
pub fn collect_events(events: &EventBus) -> UnboundedReceiver<LibraryEvent> {
    let (tx, rx) = unbounded_channel();
    events.subscribe(Arc::new(EventCollector { tx }));
    rx
}

/// Wait for the next job to finish and return its error, if any.
pub async fn next_job_outcome(rx: &mut UnboundedReceiver<LibraryEvent>) -> Option<String> {
    loop {
        match rx.recv().await.expect("event stream ended") {
            LibraryEvent::JobFinished { error } => return error,
            _ => continue,
        }
    }
}

// ====== Fake collaborators ======

pub enum FetchMode {
    /// Write an audio file and optional sidecar, then succeed.
    Succeed { with_sidecar: bool },
    /// Park until the job is cancelled.
    HangUntilCancelled,
    /// Fail immediately.
    Fail,
}

pub struct FakeFetcher {
    pub mode: FetchMode,
    /// One permit is released per fetch that starts.
    pub started: Arc<Semaphore>,
    pub fetches: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(mode: FetchMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            started: Arc::new(Semaphore::new(0)),
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(
        &self,
        _source: &str,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchedMedia, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.started.add_permits(1);
        match &self.mode {
            FetchMode::Succeed { with_sidecar } => {
                let audio = scratch.join("song.m4a");
                tokio::fs::write(&audio, b"fetched audio").await?;
                let sidecar = if *with_sidecar {
                    let path = scratch.join("song.info.json");
                    tokio::fs::write(
                        &path,
                        br#"{"track": "Fetched Song", "artist": "Fetched Artist"}"#,
                    )
                    .await?;
                    Some(path)
                } else {
                    None
                };
                Ok(FetchedMedia {
                    audio,
                    thumbnail: None,
                    sidecar,
                })
            }
            FetchMode::HangUntilCancelled => {
                cancel.cancelled().await;
                Err(FetchError::Cancelled)
            }
            FetchMode::Fail => Err(FetchError::ToolFailed("scripted failure".to_string())),
        }
    }
}

pub struct FakeProber {
    pub duration: f64,
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, _path: &Path) -> Result<ProbedMedia, ProbeError> {
        Ok(ProbedMedia {
            duration: self.duration,
            ..Default::default()
        })
    }
}

pub struct FakeArtwork;

#[async_trait]
impl ArtworkTool for FakeArtwork {
    async fn square_crop(&self, image: &[u8]) -> Result<Vec<u8>, ArtworkError> {
        Ok(image.to_vec())
    }

    async fn thumbnail(&self, _image: &[u8], edge: u32) -> Result<Vec<u8>, ArtworkError> {
        Ok(vec![0u8; edge as usize])
    }

    async fn dominant_color(&self, _image: &[u8]) -> Result<String, ArtworkError> {
        Ok("#123456".to_string())
    }

    async fn extract_embedded_art(&self, _audio: &Path) -> Result<Option<Vec<u8>>, ArtworkError> {
        Ok(None)
    }
}

pub struct FakeTranscoder {
    pub builds: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            builds: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn write_tagged_mp3(&self, request: TranscodeRequest) -> Result<(), TranscodeError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(&request.dest, b"tagged mp3").await?;
        Ok(())
    }
}

/// A job context wired to fakes.
pub fn fake_context(library: &TestLibrary, fetcher: Arc<FakeFetcher>) -> JobContext {
    JobContext {
        catalog: library.catalog.clone(),
        fetcher,
        prober: Arc::new(FakeProber { duration: 180.0 }),
        artwork: Arc::new(FakeArtwork),
        library_root: library.root.path().to_path_buf(),
        min_duration: 1.0,
    }
}

/// Names of the job scratch directories still on disk.
pub fn scratch_residue(library: &TestLibrary) -> Vec<PathBuf> {
    let scratch_root = library.root.path().join("scratch");
    match std::fs::read_dir(&scratch_root) {
        Ok(read_dir) => read_dir.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
