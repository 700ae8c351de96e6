//! External media tools behind trait seams.
//!
//! Production implementations shell out to ffprobe, ffmpeg and yt-dlp;
//! tests substitute fakes.

pub mod artwork;
pub mod fetch;
pub mod probe;
pub mod transcode;

pub use artwork::{ArtworkError, ArtworkTool, FfmpegArtwork};
pub use fetch::{FetchError, FetchedMedia, Fetcher, YtDlpFetcher};
pub use probe::{FfprobeProber, MediaProber, ProbeError, ProbedMedia};
pub use transcode::{FfmpegTranscoder, TranscodeError, TranscodeRequest, Transcoder};
