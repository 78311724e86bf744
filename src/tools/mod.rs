use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// How long a version probe may take before the tool counts as unusable
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// `CREATE_NO_WINDOW` process creation flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Availability of an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Available { version: String },
    Missing { reason: String },
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ToolStatus::Available { .. })
    }
}

/// Something that must be in place before a download may start
#[async_trait]
pub trait Prerequisite: Send + Sync {
    /// Display name of the tool
    fn name(&self) -> &str;

    /// Probe the tool, never failing
    async fn check(&self) -> ToolStatus;
}

/// Version probe for an external command-line tool
#[derive(Debug, Clone)]
pub struct ToolProbe {
    name: &'static str,
    path: PathBuf,
    version_arg: &'static str,
    banner: Option<&'static str>,
}

impl ToolProbe {
    /// FFmpeg, identified by its `ffmpeg version` banner
    pub fn ffmpeg(configured: Option<&Path>) -> Self {
        Self {
            name: "FFmpeg",
            path: resolve_tool("ffmpeg", configured),
            version_arg: "-version",
            banner: Some("ffmpeg version"),
        }
    }

    /// yt-dlp, which prints a bare version number
    pub fn yt_dlp(configured: Option<&Path>) -> Self {
        Self {
            name: "yt-dlp",
            path: resolve_tool("yt-dlp", configured),
            version_arg: "--version",
            banner: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn version_from(&self, stdout: &str) -> Option<String> {
        let first_line = stdout.lines().map(str::trim).find(|line| !line.is_empty())?;

        match self.banner {
            Some(banner) if stdout.contains(banner) => Some(first_line.to_string()),
            Some(_) => None,
            None => Some(first_line.to_string()),
        }
    }
}

#[async_trait]
impl Prerequisite for ToolProbe {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self) -> ToolStatus {
        tracing::debug!("Probing {} at {}", self.name, self.path.display());

        let mut command = Command::new(&self.path);
        command
            .arg(self.version_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let output = match tokio::time::timeout(PROBE_TIMEOUT, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolStatus::Missing {
                    reason: format!("could not run {}: {}", self.path.display(), e),
                }
            }
            Err(_) => {
                return ToolStatus::Missing {
                    reason: format!(
                        "{} did not answer within {}s",
                        self.path.display(),
                        PROBE_TIMEOUT.as_secs()
                    ),
                }
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match self.version_from(&stdout) {
            Some(version) if output.status.success() || self.banner.is_some() => {
                ToolStatus::Available { version }
            }
            _ => ToolStatus::Missing {
                reason: format!(
                    "unexpected version output from {} ({})",
                    self.path.display(),
                    output.status
                ),
            },
        }
    }
}

/// Resolve a tool path: explicit configuration first, then PATH, then the bare name
pub fn resolve_tool(binary: &str, configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    which::which(binary).unwrap_or_else(|_| PathBuf::from(binary))
}

/// Check every prerequisite, returning the ones that are missing
pub async fn missing_prerequisites(
    prerequisites: &[Box<dyn Prerequisite>],
) -> Vec<(String, String)> {
    let mut missing = Vec::new();

    for prerequisite in prerequisites {
        if let ToolStatus::Missing { reason } = prerequisite.check().await {
            missing.push((prerequisite.name().to_string(), reason));
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_configured_path() {
        let configured = PathBuf::from("/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(resolve_tool("ffmpeg", Some(configured.as_path())), configured);
    }

    #[test]
    fn test_resolve_falls_back_to_bare_name() {
        let name = "vidgrab-surely-not-installed-tool";
        assert_eq!(resolve_tool(name, None), PathBuf::from(name));
    }

    #[test]
    fn test_ffmpeg_banner_required() {
        let probe = ToolProbe::ffmpeg(Some(Path::new("ffmpeg")));
        assert_eq!(
            probe.version_from("ffmpeg version 6.1.1 Copyright (c) 2000-2023\nbuilt with gcc"),
            Some("ffmpeg version 6.1.1 Copyright (c) 2000-2023".to_string())
        );
        assert_eq!(probe.version_from("avconv version 12"), None);
        assert_eq!(probe.version_from(""), None);
    }

    #[test]
    fn test_yt_dlp_accepts_bare_version() {
        let probe = ToolProbe::yt_dlp(Some(Path::new("yt-dlp")));
        assert_eq!(probe.version_from("2024.08.06\n"), Some("2024.08.06".to_string()));
        assert_eq!(probe.version_from("   \n"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ToolProbe::ffmpeg(Some(dir.path().join("no-such-ffmpeg").as_path()));

        let status = probe.check().await;
        assert!(!status.is_available());
        assert!(matches!(status, ToolStatus::Missing { .. }));
    }

    #[tokio::test]
    async fn test_directory_as_binary_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ToolProbe::yt_dlp(Some(dir.path()));

        assert!(!probe.check().await.is_available());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ffmpeg_banner_wins_over_exit_status() {
        use crate::utils::write_script;
        let dir = tempfile::tempdir().unwrap();

        let failing = write_script(
            dir.path(),
            "ffmpeg-banner",
            "echo 'ffmpeg version 6.1.1'\nexit 1",
        );
        let status = ToolProbe::ffmpeg(Some(failing.as_path())).check().await;
        assert_eq!(
            status,
            ToolStatus::Available {
                version: "ffmpeg version 6.1.1".to_string()
            }
        );

        let impostor = write_script(
            dir.path(),
            "ffmpeg-impostor",
            "echo 'avconv version 12'\nexit 0",
        );
        let status = ToolProbe::ffmpeg(Some(impostor.as_path())).check().await;
        assert!(matches!(status, ToolStatus::Missing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_yt_dlp_requires_successful_exit() {
        use crate::utils::write_script;
        let dir = tempfile::tempdir().unwrap();

        let working = write_script(dir.path(), "yt-dlp-ok", "echo 2024.08.06");
        let status = ToolProbe::yt_dlp(Some(working.as_path())).check().await;
        assert_eq!(
            status,
            ToolStatus::Available {
                version: "2024.08.06".to_string()
            }
        );

        let broken = write_script(dir.path(), "yt-dlp-broken", "echo 2024.08.06\nexit 2");
        let status = ToolProbe::yt_dlp(Some(broken.as_path())).check().await;
        assert!(!status.is_available());
    }

    #[tokio::test]
    async fn test_missing_prerequisites_collects_names() {
        let dir = tempfile::tempdir().unwrap();
        let prerequisites: Vec<Box<dyn Prerequisite>> = vec![
            Box::new(ToolProbe::ffmpeg(Some(dir.path().join("ffmpeg").as_path()))),
            Box::new(ToolProbe::yt_dlp(Some(dir.path().join("yt-dlp").as_path()))),
        ];

        let missing = missing_prerequisites(&prerequisites).await;
        let names: Vec<_> = missing.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["FFmpeg", "yt-dlp"]);
    }
}
