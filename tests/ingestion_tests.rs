//! End-to-end ingestion queue behavior with fake media tools.

mod common;

use common::{
    collect_events, fake_context, next_job_outcome, scratch_residue, FakeArtwork, FakeFetcher,
    FakeProber, FetchMode, TestLibrary,
};
use sonohub::events::LibraryEvent;
use sonohub::ingestion::{import_directory, CancelError, EnqueueError, IngestionQueue, JobContext};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_successful_ingest_adds_an_entry() {
    let library = TestLibrary::new();
    let mut events = collect_events(&library.events);
    let fetcher = FakeFetcher::new(FetchMode::Succeed { with_sidecar: true });
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 4);

    queue
        .enqueue("https://www.youtube.com/watch?v=abc123")
        .unwrap();
    assert_eq!(next_job_outcome(&mut events).await, None);

    let entries = library.catalog.all_entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.music.title, "Fetched Song");
    assert_eq!(entry.music.artist, "Fetched Artist");
    assert_eq!(entry.music.duration, 180.0);
    assert_eq!(entry.file.filename, "original.m4a");

    // The staged files ended up in the entry's directory.
    let dir = library.catalog.songs_dir().join(&entry.id);
    assert!(dir.join("original.m4a").exists());
    assert!(scratch_residue(&library).is_empty());
    assert!(queue.last_error().is_none());

    queue.shutdown().await;
}

#[tokio::test]
async fn test_full_queue_rejects_without_blocking() {
    let library = TestLibrary::new();
    let fetcher = FakeFetcher::new(FetchMode::HangUntilCancelled);
    let started = fetcher.started.clone();
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 2);

    // First job is picked up by the worker and hangs there.
    queue.enqueue("https://example.com/one").unwrap();
    started.acquire().await.unwrap().forget();

    // Two more fill the queue, the next is turned away.
    queue.enqueue("https://example.com/two").unwrap();
    queue.enqueue("https://example.com/three").unwrap();
    assert!(matches!(
        queue.enqueue("https://example.com/four"),
        Err(EnqueueError::QueueFull)
    ));

    assert_eq!(queue.current().as_deref(), Some("https://example.com/one"));
    queue.shutdown().await;
}

#[tokio::test]
async fn test_cancel_kills_the_running_job_and_leaves_nothing() {
    let library = TestLibrary::new();
    let mut events = collect_events(&library.events);
    let fetcher = FakeFetcher::new(FetchMode::HangUntilCancelled);
    let started = fetcher.started.clone();
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 4);

    queue.enqueue("https://example.com/slow").unwrap();
    started.acquire().await.unwrap().forget();

    queue.cancel().unwrap();
    let outcome = next_job_outcome(&mut events).await;
    assert_eq!(outcome.as_deref(), Some("job cancelled"));

    assert!(library.catalog.is_empty());
    assert!(scratch_residue(&library).is_empty());
    assert!(queue.current().is_none());

    queue.shutdown().await;
}

#[tokio::test]
async fn test_cancel_with_no_running_job_fails() {
    let library = TestLibrary::new();
    let fetcher = FakeFetcher::new(FetchMode::Succeed {
        with_sidecar: false,
    });
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 4);

    assert!(matches!(queue.cancel(), Err(CancelError::NoActiveJob)));
    queue.shutdown().await;
}

#[tokio::test]
async fn test_known_source_is_rejected_before_queueing() {
    let library = TestLibrary::new();
    library.add_entry("aaaa", "youtube.com/watch?v=dQw4w9WgXcQ");
    let fetcher = FakeFetcher::new(FetchMode::Succeed {
        with_sidecar: false,
    });
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 4);

    // Different spellings of the same video are all duplicates.
    for input in [
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "youtu.be/dQw4w9WgXcQ",
        "https://music.youtube.com/watch?v=dQw4w9WgXcQ&feature=share",
    ] {
        match queue.enqueue(input) {
            Err(EnqueueError::AlreadyExists { id, .. }) => assert_eq!(id, "aaaa"),
            other => panic!("expected AlreadyExists for {}, got {:?}", input, other.err()),
        }
    }

    // A different video id is not a duplicate.
    queue
        .enqueue("https://www.youtube.com/watch?v=dQw4w9WgXcQ2")
        .unwrap();

    queue.shutdown().await;
}

#[tokio::test]
async fn test_free_text_becomes_a_search() {
    let library = TestLibrary::new();
    let mut events = collect_events(&library.events);
    let fetcher = FakeFetcher::new(FetchMode::Succeed {
        with_sidecar: false,
    });
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 4);

    queue.enqueue("never gonna give you up").unwrap();

    let started_url = loop {
        match events.recv().await.unwrap() {
            LibraryEvent::JobStarted { url } => break url,
            _ => continue,
        }
    };
    assert_eq!(started_url, "ytsearch:never gonna give you up");

    queue.shutdown().await;
}

#[tokio::test]
async fn test_failed_job_reports_and_cleans_up() {
    let library = TestLibrary::new();
    let mut events = collect_events(&library.events);
    let fetcher = FakeFetcher::new(FetchMode::Fail);
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 4);

    queue.enqueue("https://example.com/broken").unwrap();
    let outcome = next_job_outcome(&mut events).await;
    assert!(outcome.unwrap().contains("scripted failure"));

    assert!(library.catalog.is_empty());
    assert!(scratch_residue(&library).is_empty());
    assert!(queue.last_error().unwrap().contains("scripted failure"));

    queue.shutdown().await;
}

#[tokio::test]
async fn test_jobs_run_in_submission_order() {
    let library = TestLibrary::new();
    let mut events = collect_events(&library.events);
    let fetcher = FakeFetcher::new(FetchMode::Succeed {
        with_sidecar: false,
    });
    let counter = fetcher.clone();
    let queue = IngestionQueue::start(fake_context(&library, fetcher), library.events.clone(), 8);

    queue.enqueue("https://example.com/first").unwrap();
    queue.enqueue("https://example.com/second").unwrap();
    queue.enqueue("https://example.com/third").unwrap();

    let mut started = Vec::new();
    let mut finished = 0;
    while finished < 3 {
        match events.recv().await.unwrap() {
            LibraryEvent::JobStarted { url } => started.push(url),
            LibraryEvent::JobFinished { .. } => finished += 1,
            _ => {}
        }
    }
    assert_eq!(
        started,
        vec![
            "https://example.com/first",
            "https://example.com/second",
            "https://example.com/third"
        ]
    );
    assert_eq!(counter.fetches.load(Ordering::SeqCst), 3);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_import_adds_local_files() {
    let library = TestLibrary::new();
    let source = tempfile::tempdir().unwrap();
    std::fs::write(source.path().join("road trip.mp3"), b"mp3 bytes").unwrap();
    std::fs::write(source.path().join("notes.txt"), b"not audio").unwrap();

    let ctx = fake_context(&library, FakeFetcher::new(FetchMode::Fail));
    let summary = import_directory(&ctx, source.path()).await;

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 0);
    let entries = library.catalog.all_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].music.title, "road trip");
    assert!(entries[0].is_imported());
    assert!(!entries[0].sync.should);
    assert!(scratch_residue(&library).is_empty());
}

#[tokio::test]
async fn test_import_rejects_short_audio_without_residue() {
    let library = TestLibrary::new();
    let source = tempfile::tempdir().unwrap();
    std::fs::write(source.path().join("jingle.mp3"), b"mp3 bytes").unwrap();

    let ctx = JobContext {
        catalog: library.catalog.clone(),
        fetcher: FakeFetcher::new(FetchMode::Fail),
        prober: Arc::new(FakeProber { duration: 0.4 }),
        artwork: Arc::new(FakeArtwork),
        library_root: library.root.path().to_path_buf(),
        min_duration: 1.0,
    };
    let summary = import_directory(&ctx, source.path()).await;

    assert_eq!(summary.imported, 0);
    assert_eq!(summary.skipped, 1);
    assert!(library.catalog.all_entries().is_empty());
    assert!(scratch_residue(&library).is_empty());
}
