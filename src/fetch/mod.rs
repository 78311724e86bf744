use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod ytdlp;

pub use ytdlp::YtDlpFetcher;

use crate::progress::ProgressObserver;

/// Information about a video, fetched without downloading it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Video identifier on the hosting site
    #[serde(default)]
    pub id: String,

    /// Title of the video
    #[serde(default)]
    pub title: String,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    /// Resolution as reported by the site, e.g. "1920x1080"
    #[serde(default)]
    pub resolution: Option<String>,

    #[serde(default)]
    pub view_count: Option<u64>,

    #[serde(default)]
    pub like_count: Option<u64>,

    #[serde(default)]
    pub uploader: Option<String>,
}

/// Settings for one download
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// yt-dlp format selection expression
    pub format_selector: String,

    /// Container the streams are merged into
    pub container: String,

    /// FFmpeg binary handed to the fetcher for merging
    pub ffmpeg_location: PathBuf,

    /// Scratch directory receiving all intermediate files
    pub working_dir: PathBuf,
}

/// What the fetcher knows about its output
#[derive(Debug, Clone, Default)]
pub struct FetchedMedia {
    /// Final file path, when the fetcher reported one
    pub reported_path: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Failed to start media fetcher: {0}")]
    Launch(#[source] std::io::Error),

    #[error("Media fetcher exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("Unreadable media fetcher output: {0}")]
    Parse(String),

    #[error("Canceled by user")]
    Cancelled,
}

/// Resolves a URL to media and downloads it
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Query metadata only; no media bytes are transferred
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, FetchError>;

    /// Download and merge the selected streams into `options.working_dir`
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress: &dyn ProgressObserver,
    ) -> Result<FetchedMedia, FetchError>;
}
