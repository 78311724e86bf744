use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::fileops::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Download settings
    pub download: DownloadConfig,

    /// External tool locations
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Retry settings for file moves and deletes
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory that receives finished downloads
    pub output_dir: PathBuf,

    /// Target container extension
    pub container: String,

    /// Maximum video height to select
    pub max_height: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary, otherwise searched on PATH
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit yt-dlp binary, otherwise searched on PATH
    pub yt_dlp_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per file operation, including the first one
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig {
                output_dir: PathBuf::from("downloads"),
                container: "mp4".to_string(),
                max_height: 1080,
            },
            tools: ToolsConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            Self::from_yaml(&content)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("vidgrab").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let container = &self.download.container;
        if container.is_empty() || !container.chars().all(|c| c.is_ascii_alphanumeric()) {
            anyhow::bail!(
                "Container must be a plain file extension like \"mp4\", got {:?}",
                container
            );
        }

        if self.download.max_height == 0 {
            anyhow::bail!("max_height must be greater than zero");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        Ok(())
    }

    /// Retry policy for the file operator
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        let show_path = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(search PATH)".to_string())
        };

        println!("Current Configuration:");
        println!("  Output Directory: {}", self.download.output_dir.display());
        println!("  Container: {}", self.download.container);
        println!("  Max Height: {}p", self.download.max_height);
        println!("  FFmpeg: {}", show_path(&self.tools.ffmpeg_path));
        println!("  yt-dlp: {}", show_path(&self.tools.yt_dlp_path));
        println!(
            "  File Retries: {} attempts, {} ms apart",
            self.retry.max_attempts, self.retry.delay_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download.container, "mp4");
        assert_eq!(config.download.max_height, 1080);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = "download:\n  output_dir: /tmp/videos\n  container: mkv\n  max_height: 720\n";
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.download.output_dir, PathBuf::from("/tmp/videos"));
        assert_eq!(config.download.container, "mkv");
        assert!(config.tools.ffmpeg_path.is_none());
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
download:
  output_dir: downloads
  container: mp4
  max_height: 1080
tools:
  ffmpeg_path: C:\ffmpeg\bin\ffmpeg.exe
  yt_dlp_path: null
retry:
  max_attempts: 3
  delay_ms: 250
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(
            config.tools.ffmpeg_path,
            Some(PathBuf::from(r"C:\ffmpeg\bin\ffmpeg.exe"))
        );
        assert_eq!(config.retry_policy().delay, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let bad_container = "download:\n  output_dir: d\n  container: .mp4\n  max_height: 1080\n";
        assert!(Config::from_yaml(bad_container).is_err());

        let zero_height = "download:\n  output_dir: d\n  container: mp4\n  max_height: 0\n";
        assert!(Config::from_yaml(zero_height).is_err());

        let zero_attempts = "download:\n  output_dir: d\n  container: mp4\n  max_height: 1080\n\
                             retry:\n  max_attempts: 0\n  delay_ms: 10\n";
        assert!(Config::from_yaml(zero_attempts).is_err());
    }

    #[test]
    fn test_yaml_round_trip_keeps_paths() {
        let mut config = Config::default();
        config.tools.yt_dlp_path = Some(PathBuf::from("/opt/bin/yt-dlp"));

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.tools.yt_dlp_path, config.tools.yt_dlp_path);
    }
}
