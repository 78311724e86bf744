//! vidgrab - A Rust CLI tool for downloading single videos
//!
//! This library drives yt-dlp to fetch the best video and audio streams of a URL,
//! lets FFmpeg merge them into one container and moves the finished file into an
//! output directory, retrying file operations that hit transient locks.

pub mod cli;
pub mod config;
pub mod download;
pub mod fetch;
pub mod fileops;
pub mod output;
pub mod progress;
pub mod tools;
pub mod utils;

use std::path::PathBuf;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use download::{DownloadPipeline, DownloadReport, Relocation, Stage};
pub use fetch::{MediaFetcher, VideoMetadata};
pub use fileops::{FileOperation, FileOperator, OpOutcome, RetryPolicy};
pub use progress::{ConsoleProgress, NoopProgress, ProgressEvent, ProgressObserver};
pub use tools::{Prerequisite, ToolProbe, ToolStatus};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Ways a single download attempt can fail
#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("{tool} not found or not callable: {reason}")]
    DependencyMissing { tool: String, reason: String },

    #[error("Failed to fetch video information: {0}")]
    MetadataFetch(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Download canceled by user")]
    Cancelled,

    #[error("Final merged file not found in {}", working_dir.display())]
    ArtifactNotFound { working_dir: PathBuf },

    #[error("File operation failed during {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub(crate) fn io(stage: Stage) -> impl FnOnce(std::io::Error) -> Self {
        move |source| DownloadError::Io { stage, source }
    }
}
