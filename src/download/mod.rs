use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::Config;
use crate::fetch::{DownloadOptions, FetchError, MediaFetcher, VideoMetadata, YtDlpFetcher};
use crate::fileops::{FileOperation, FileOperator};
use crate::output;
use crate::progress::{ConsoleProgress, NoopProgress, ProgressObserver};
use crate::tools::{self, Prerequisite, ToolProbe};
use crate::utils::{format_selector, normalize_url, or_interrupted};
use crate::DownloadError;

pub mod artifact;

/// Steps of a single download attempt, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidateDeps,
    PrepareDirs,
    FetchMetadata,
    Download,
    LocateArtifact,
    Relocate,
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ValidateDeps => write!(f, "dependency check"),
            Stage::PrepareDirs => write!(f, "directory setup"),
            Stage::FetchMetadata => write!(f, "metadata fetch"),
            Stage::Download => write!(f, "download"),
            Stage::LocateArtifact => write!(f, "file lookup"),
            Stage::Relocate => write!(f, "relocation"),
            Stage::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// A URL as typed and as it will be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub raw_url: String,
    pub normalized_url: String,
}

impl DownloadRequest {
    pub fn new(raw_url: &str) -> Self {
        Self {
            raw_url: raw_url.to_string(),
            normalized_url: normalize_url(raw_url),
        }
    }
}

/// How the finished file reached the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    Moved,
    /// The move never succeeded; the file was copied and the source left in place
    CopiedFallback,
}

/// Result of a successful download
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub title: String,
    pub saved_path: PathBuf,
    pub relocation: Relocation,

    /// Scratch entries that could not be removed
    pub cleanup_failures: Vec<PathBuf>,

    pub completed_at: DateTime<Utc>,
}

/// Settings the pipeline needs from the configuration
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_dir: PathBuf,
    pub container: String,
    pub max_height: u32,
    pub ffmpeg_location: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &Config, ffmpeg_location: PathBuf) -> Self {
        Self {
            output_dir: config.download.output_dir.clone(),
            container: config.download.container.clone(),
            max_height: config.download.max_height,
            ffmpeg_location,
        }
    }
}

/// Download-and-finalize pipeline for one video at a time
pub struct DownloadPipeline {
    settings: PipelineSettings,
    prerequisites: Vec<Box<dyn Prerequisite>>,
    fetcher: Box<dyn MediaFetcher>,
    file_operator: FileOperator,
    progress: Arc<dyn ProgressObserver>,
    quiet: bool,
}

impl DownloadPipeline {
    /// Create a pipeline backed by yt-dlp and FFmpeg
    pub fn new(config: &Config, quiet: bool) -> Self {
        let ffmpeg = ToolProbe::ffmpeg(config.tools.ffmpeg_path.as_deref());
        let yt_dlp = ToolProbe::yt_dlp(config.tools.yt_dlp_path.as_deref());

        let progress: Arc<dyn ProgressObserver> = if quiet {
            Arc::new(NoopProgress)
        } else {
            Arc::new(ConsoleProgress::new())
        };

        Self {
            settings: PipelineSettings::from_config(config, ffmpeg.path().to_path_buf()),
            fetcher: Box::new(YtDlpFetcher::new(yt_dlp.path())),
            prerequisites: vec![Box::new(ffmpeg), Box::new(yt_dlp)],
            file_operator: FileOperator::new(config.retry_policy()),
            progress,
            quiet,
        }
    }

    /// Assemble a pipeline from explicit collaborators
    pub fn from_parts(
        settings: PipelineSettings,
        prerequisites: Vec<Box<dyn Prerequisite>>,
        fetcher: Box<dyn MediaFetcher>,
        file_operator: FileOperator,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            settings,
            prerequisites,
            fetcher,
            file_operator,
            progress,
            quiet: true,
        }
    }

    pub fn prerequisites(&self) -> &[Box<dyn Prerequisite>] {
        &self.prerequisites
    }

    /// Run one attempt, print its outcome and report success
    pub async fn run(&self, raw_url: &str) -> bool {
        match self.download(raw_url).await {
            Ok(report) => {
                output::print_report(&report);
                true
            }
            Err(e) => {
                output::print_failure(&e);
                false
            }
        }
    }

    /// Run one attempt through every stage
    pub async fn download(&self, raw_url: &str) -> Result<DownloadReport, DownloadError> {
        let request = DownloadRequest::new(raw_url);
        tracing::info!("Starting download for URL: {}", request.normalized_url);

        enter(Stage::ValidateDeps);
        or_interrupted(self.validate_dependencies())
            .await
            .ok_or(DownloadError::Cancelled)??;

        enter(Stage::PrepareDirs);
        let working_dir = self.prepare_dirs().await?;

        enter(Stage::FetchMetadata);
        let metadata = match self.fetch_metadata(&request).await {
            Ok(metadata) => metadata,
            Err(e) => {
                // Nothing was written yet; only drop the directory if it is still empty
                if let Err(remove_err) = tokio::fs::remove_dir(&working_dir).await {
                    tracing::debug!("Kept {}: {}", working_dir.display(), remove_err);
                }
                return Err(e);
            }
        };

        enter(Stage::Download);
        if !self.quiet {
            output::print_download_start();
        }
        let options = DownloadOptions {
            format_selector: format_selector(self.settings.max_height),
            container: self.settings.container.clone(),
            ffmpeg_location: self.settings.ffmpeg_location.clone(),
            working_dir: working_dir.clone(),
        };
        let fetched = self
            .fetcher
            .download(&request.normalized_url, &options, self.progress.as_ref())
            .await
            .map_err(|e| match e {
                FetchError::Cancelled => DownloadError::Cancelled,
                other => DownloadError::Download(other.to_string()),
            })?;

        enter(Stage::LocateArtifact);
        let artifact = artifact::locate_artifact(
            &working_dir,
            fetched.reported_path.as_deref(),
            &self.settings.container,
        )
        .await
        .map_err(DownloadError::io(Stage::LocateArtifact))?
        .ok_or_else(|| DownloadError::ArtifactNotFound {
            working_dir: working_dir.clone(),
        })?;

        enter(Stage::Relocate);
        let (saved_path, relocation) = self.relocate(&artifact).await?;

        enter(Stage::Cleanup);
        let cleanup_failures = self.cleanup(&working_dir).await;

        Ok(DownloadReport {
            title: metadata.title,
            saved_path,
            relocation,
            cleanup_failures,
            completed_at: Utc::now(),
        })
    }

    async fn validate_dependencies(&self) -> Result<(), DownloadError> {
        let missing = tools::missing_prerequisites(&self.prerequisites).await;

        match missing.into_iter().next() {
            Some((tool, reason)) => Err(DownloadError::DependencyMissing { tool, reason }),
            None => Ok(()),
        }
    }

    /// Create the output directory and a fresh, uniquely named working directory
    async fn prepare_dirs(&self) -> Result<PathBuf, DownloadError> {
        let output_dir = &self.settings.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(DownloadError::io(Stage::PrepareDirs))?;

        let suffix = Uuid::new_v4().simple().to_string();
        let working_dir = output_dir.join(format!("temp-{}", &suffix[..8]));
        tokio::fs::create_dir_all(&working_dir)
            .await
            .map_err(DownloadError::io(Stage::PrepareDirs))?;

        tracing::debug!("Working directory: {}", working_dir.display());
        Ok(working_dir)
    }

    async fn fetch_metadata(
        &self,
        request: &DownloadRequest,
    ) -> Result<VideoMetadata, DownloadError> {
        if !self.quiet {
            output::print_fetching_info();
        }

        let started = Instant::now();
        let metadata = self
            .fetcher
            .fetch_metadata(&request.normalized_url)
            .await
            .map_err(|e| match e {
                FetchError::Cancelled => DownloadError::Cancelled,
                other => DownloadError::MetadataFetch(other.to_string()),
            })?;

        if !self.quiet {
            output::print_metadata(&metadata, started.elapsed());
        }

        Ok(metadata)
    }

    /// Move the artifact into the output directory, copying when the move keeps failing
    async fn relocate(&self, artifact: &Path) -> Result<(PathBuf, Relocation), DownloadError> {
        let file_name = artifact::output_file_name(artifact, &self.settings.container);
        let destination = self.settings.output_dir.join(file_name);

        match self
            .file_operator
            .execute(&FileOperation::rename(artifact, &destination))
            .await
        {
            Ok(outcome) if outcome.succeeded() => return Ok((destination, Relocation::Moved)),
            Ok(outcome) => tracing::warn!(
                "Moving {} failed after {} attempts ({}), copying instead",
                artifact.display(),
                outcome.attempts(),
                outcome
                    .last_error()
                    .map(|e| e.to_string())
                    .unwrap_or_default()
            ),
            Err(e) => tracing::warn!(
                "Moving {} failed ({}), copying instead",
                artifact.display(),
                e
            ),
        }

        let from = artifact.to_path_buf();
        let to = destination.clone();
        tokio::task::spawn_blocking(move || copy_preserving_times(&from, &to))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .and_then(|copied| copied)
            .map_err(DownloadError::io(Stage::Relocate))?;

        Ok((destination, Relocation::CopiedFallback))
    }

    /// Remove every scratch entry, then the working directory itself; failures are collected
    async fn cleanup(&self, working_dir: &Path) -> Vec<PathBuf> {
        let mut failures = Vec::new();

        match tokio::fs::read_dir(working_dir).await {
            Ok(mut entries) => loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let path = entry.path();
                        if !self.delete(&path).await {
                            failures.push(path);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Stopped listing {}: {}", working_dir.display(), e);
                        break;
                    }
                }
            },
            Err(e) => tracing::warn!("Could not list {}: {}", working_dir.display(), e),
        }

        if !self.delete(working_dir).await {
            failures.push(working_dir.to_path_buf());
        }

        failures
    }

    async fn delete(&self, path: &Path) -> bool {
        match self.file_operator.execute(&FileOperation::delete(path)).await {
            Ok(outcome) => outcome.succeeded(),
            Err(e) => {
                tracing::warn!("Could not remove {}: {}", path.display(), e);
                false
            }
        }
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "Entering stage");
}

/// Copy file contents and permissions, then carry over the modification time
fn copy_preserving_times(from: &Path, to: &Path) -> io::Result<()> {
    fs_err::copy(from, to)?;

    let modified = fs_err::metadata(from)?.modified()?;
    fs_err::OpenOptions::new()
        .write(true)
        .open(to)?
        .file()
        .set_modified(modified)?;

    Ok(())
}
