use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sonohub::catalog::Catalog;
use sonohub::config::{Config, FileConfig};
use sonohub::events::{EventBus, LibraryEvent, Observer};
use sonohub::ingestion::{import_directory, IngestionQueue, JobContext};
use sonohub::media::{FfmpegArtwork, FfmpegTranscoder, FfprobeProber, YtDlpFetcher};
use sonohub::renditions::{CoverPreviewCache, TaggedAudioCache};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the TOML config file.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the library directory (catalog file and song files).
    #[clap(long, value_parser = parse_path)]
    pub library_root: Option<PathBuf>,

    /// Import the audio files under this directory, then exit.
    #[clap(long, value_parser = parse_path)]
    pub import: Option<PathBuf>,
}

/// Logs library events; also keeps the bus exercised when nothing else
/// has subscribed yet.
struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, event: &LibraryEvent) {
        match event {
            LibraryEvent::SongAdded { entry } => {
                info!("Song added: {} ({})", entry.song_name(), entry.id)
            }
            LibraryEvent::SongEdited { entry } => {
                info!("Song edited: {} ({})", entry.song_name(), entry.id)
            }
            LibraryEvent::SongDeleted { id } => info!("Song deleted: {}", id),
            LibraryEvent::JobStarted { url } => info!("Job started: {}", url),
            LibraryEvent::JobFinished { error: None } => info!("Job finished"),
            LibraryEvent::JobFinished { error: Some(err) } => {
                info!("Job finished with error: {}", err)
            }
        }
    }
}

/// Drops cached renditions of deleted songs.
struct CacheInvalidator {
    audio: Arc<TaggedAudioCache>,
    covers: Arc<CoverPreviewCache>,
}

impl Observer for CacheInvalidator {
    fn notify(&self, event: &LibraryEvent) {
        if let LibraryEvent::SongDeleted { id } = event {
            self.audio.invalidate(id);
            self.covers.invalidate(id);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let mut config: Config = match &cli_args.config {
        Some(path) => FileConfig::load(path)?.into_config(),
        None => Config::default(),
    };
    if let Some(root) = cli_args.library_root {
        config.library_root = root;
    }
    info!("Library root: {:?}", config.library_root);

    let events = Arc::new(EventBus::new());
    events.subscribe(Arc::new(LogObserver));

    let catalog = Arc::new(
        Catalog::open(&config.library_root, events.clone())
            .context("Failed to open the catalog")?,
    );
    info!("Catalog holds {} entries", catalog.len());
    catalog.startup_cleanup(config.keep_generated_days);

    let prober = Arc::new(FfprobeProber::new(config.ffprobe.clone()));
    let artwork = Arc::new(FfmpegArtwork::new(config.ffmpeg.clone()));
    let transcoder = Arc::new(FfmpegTranscoder::new(config.ffmpeg.clone()));
    let fetcher = Arc::new(YtDlpFetcher::new(config.ytdlp.clone()));

    let ctx = JobContext {
        catalog: catalog.clone(),
        fetcher,
        prober,
        artwork: artwork.clone(),
        library_root: config.library_root.clone(),
        min_duration: config.min_duration_secs,
    };

    if let Some(dir) = cli_args.import {
        let summary = import_directory(&ctx, &dir).await;
        info!(
            "Imported {} files, skipped {}",
            summary.imported, summary.skipped
        );
        return Ok(());
    }

    let audio_cache = Arc::new(TaggedAudioCache::new(
        transcoder,
        artwork.clone(),
        catalog.songs_dir(),
    ));
    let cover_cache = Arc::new(CoverPreviewCache::new(
        artwork,
        catalog.songs_dir(),
        config.cover_preview_edge,
    ));
    events.subscribe(Arc::new(CacheInvalidator {
        audio: audio_cache.clone(),
        covers: cover_cache.clone(),
    }));
    if config.warm_covers_on_start {
        cover_cache.warm_up(&catalog.all_entries()).await;
    }

    let queue = IngestionQueue::start(ctx, events, config.queue_capacity);

    info!("Ready, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Shutting down");
    queue.shutdown().await;
    Ok(())
}
