use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};

use super::{DownloadOptions, FetchError, FetchedMedia, MediaFetcher, VideoMetadata};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::utils::interrupted;

/// Prefix of the machine-readable progress lines we ask yt-dlp for
const PROGRESS_MARKER: &str = "vidgrab-progress";

/// Prefix of the line carrying the final file path
const FILE_MARKER: &str = "vidgrab-file";

/// Number of stderr lines kept for error reports
const STDERR_TAIL: usize = 20;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Media fetcher backed by the yt-dlp executable
pub struct YtDlpFetcher {
    yt_dlp_path: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(yt_dlp_path: impl Into<PathBuf>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.yt_dlp_path);
        // Piped output otherwise follows the ANSI code page on Windows
        command
            .env("PYTHONIOENCODING", "UTF-8")
            .env("PYTHONUTF8", "1")
            .args(["--encoding", "utf-8"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);
        command
    }

    /// Arguments for a merged download into the working directory
    pub fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
        let output_template = options.working_dir.join("%(title)s.%(ext)s");

        let mut args: Vec<String> = [
            "--format",
            options.format_selector.as_str(),
            "--merge-output-format",
            options.container.as_str(),
            "--recode-video",
            options.container.as_str(),
            "--ffmpeg-location",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();

        args.push(options.ffmpeg_location.to_string_lossy().into_owned());
        args.push("--output".to_string());
        args.push(output_template.to_string_lossy().into_owned());

        args.extend(
            [
                "--windows-filenames",
                "--no-playlist",
                "--no-warnings",
                "--no-keep-video",
                "--newline",
                "--progress",
                "--progress-template",
            ]
            .iter()
            .map(|arg| arg.to_string()),
        );
        args.push(format!(
            "download:{} %(progress.status)s %(progress.downloaded_bytes)s \
             %(progress.total_bytes)s %(progress.total_bytes_estimate)s",
            PROGRESS_MARKER
        ));
        args.push("--print".to_string());
        args.push(format!("after_move:{} %(filepath)s", FILE_MARKER));
        args.push(url.to_string());

        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, FetchError> {
        tracing::debug!("Extracting video info for: {}", url);

        let mut command = self.command();
        command.args(["--dump-json", "--no-playlist", "--no-warnings", url]);

        let output = tokio::select! {
            biased;
            _ = interrupted() => return Err(FetchError::Cancelled),
            output = command.output() => output.map_err(FetchError::Launch)?,
        };

        if !output.status.success() {
            return Err(FetchError::ToolFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_metadata(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress: &dyn ProgressObserver,
    ) -> Result<FetchedMedia, FetchError> {
        tracing::debug!("Downloading {} into {}", url, options.working_dir.display());

        let mut command = self.command();
        command.args(Self::download_args(url, options));
        // Keep the terminal's Ctrl+C away from yt-dlp; we stop it ourselves
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(FetchError::Launch)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Parse("yt-dlp stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Parse("yt-dlp stderr was not captured".to_string()))?;
        let stderr_task = tokio::spawn(collect_tail(stderr));

        let mut reader = BufReader::new(stdout);
        let mut buffer = Vec::new();
        let mut reported_path = None;

        let run = async {
            while let Some(line) = read_lossy_line(&mut reader, &mut buffer).await? {
                match parse_line(&line) {
                    OutputLine::Progress(event) => progress.on_event(&event),
                    OutputLine::FinalPath(path) => reported_path = Some(path),
                    OutputLine::Other => tracing::debug!("yt-dlp: {}", line),
                }
            }
            child.wait().await
        };

        let finished = tokio::select! {
            biased;
            _ = interrupted() => None,
            status = run => Some(status),
        };

        let status = match finished {
            Some(status) => status.map_err(FetchError::Launch)?,
            None => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to stop yt-dlp: {}", e);
                }
                stderr_task.abort();
                return Err(FetchError::Cancelled);
            }
        };

        let stderr_tail = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(FetchError::ToolFailed {
                status: status.to_string(),
                stderr: stderr_tail,
            });
        }

        Ok(FetchedMedia { reported_path })
    }
}

/// Read one line without its terminator, replacing invalid UTF-8; `None` at end of stream
async fn read_lossy_line<R>(reader: &mut R, buffer: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buffer.clear();
    if reader.read_until(b'\n', buffer).await? == 0 {
        return Ok(None);
    }

    while matches!(buffer.last(), Some(b'\n' | b'\r')) {
        buffer.pop();
    }

    Ok(Some(String::from_utf8_lossy(buffer).into_owned()))
}

async fn collect_tail(stderr: ChildStderr) -> String {
    let mut reader = BufReader::new(stderr);
    let mut buffer = Vec::new();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);

    loop {
        match read_lossy_line(&mut reader, &mut buffer).await {
            Ok(Some(line)) => {
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Stopped reading yt-dlp stderr: {}", e);
                break;
            }
        }
    }

    Vec::from(tail).join("\n")
}

fn parse_metadata(stdout: &str) -> Result<VideoMetadata, FetchError> {
    let json = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| FetchError::Parse("yt-dlp printed no video information".to_string()))?;

    serde_json::from_str(json).map_err(|e| FetchError::Parse(e.to_string()))
}

#[derive(Debug, PartialEq)]
enum OutputLine {
    Progress(ProgressEvent),
    FinalPath(PathBuf),
    Other,
}

fn parse_line(line: &str) -> OutputLine {
    let line = line.trim_end();

    if let Some(rest) = line.strip_prefix(FILE_MARKER) {
        let path = rest.trim();
        if !path.is_empty() {
            return OutputLine::FinalPath(Path::new(path).to_path_buf());
        }
        return OutputLine::Other;
    }

    let Some(rest) = line.strip_prefix(PROGRESS_MARKER) else {
        return OutputLine::Other;
    };

    let mut fields = rest.split_whitespace();
    let status = fields.next();
    let downloaded_bytes = byte_count(fields.next()).unwrap_or(0);
    let total_bytes = byte_count(fields.next());
    let total_bytes_estimate = byte_count(fields.next());

    match status {
        Some("downloading") => OutputLine::Progress(ProgressEvent::Downloading {
            downloaded_bytes,
            total_bytes,
            total_bytes_estimate,
        }),
        Some("finished") => OutputLine::Progress(ProgressEvent::Finished { downloaded_bytes }),
        _ => OutputLine::Other,
    }
}

/// yt-dlp prints `NA` for unknown values and floats for estimates
fn byte_count(field: Option<&str>) -> Option<u64> {
    let value: f64 = field?.parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value as u64)
}
