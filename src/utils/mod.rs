use anyhow::Result;
use std::future::Future;
use url::Url;

/// Query marker yt-dlp treats as a playlist selection
const PLAYLIST_MARKER: &str = "&list=";

/// Strip the playlist selector and everything after it, so only the single video is fetched.
///
/// No validation happens here; any input string is accepted.
pub fn normalize_url(url: &str) -> String {
    match url.find(PLAYLIST_MARKER) {
        Some(index) => url[..index].to_string(),
        None => url.to_string(),
    }
}

/// Validate a URL typed by the user
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed)
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format a media duration as a clock, `MM:SS` or `H:MM:SS`
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Format an optional counter like views or likes
pub fn format_count(count: Option<u64>) -> String {
    count
        .map(|c| c.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Sanitize a file stem for every filesystem we may write to
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Windows refuses names ending in a dot or a space
    let trimmed = sanitized.trim().trim_end_matches(['.', ' ']);

    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Completes when the user presses Ctrl+C; never completes if the handler cannot be installed.
///
/// The first call replaces the default SIGINT behaviour for the rest of the
/// process. From then on Ctrl+C only acts where a future is raced against this
/// one: the dependency check, the metadata query, the download and the prompt.
/// Relocation and cleanup run to completion so that no half-moved file is left
/// behind.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::debug!("Ctrl+C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run `future` unless the user presses Ctrl+C first; `None` when interrupted
pub async fn or_interrupted<F: Future>(future: F) -> Option<F::Output> {
    race_interrupt(future, interrupted()).await
}

async fn race_interrupt<F, I>(future: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = interrupt => None,
        output = future => Some(output),
    }
}

/// Format selector for the best streams at or below `max_height`
pub fn format_selector(max_height: u32) -> String {
    format!(
        "bestvideo[height<={h}]+bestaudio/best[height<={h}]",
        h = max_height
    )
}

/// Write an executable shell script standing in for an external tool
#[cfg(all(test, unix))]
pub(crate) fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs_err::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs_err::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_strips_playlist() {
        assert_eq!(
            normalize_url("https://youtube.com/watch?v=abc123&list=PL999"),
            "https://youtube.com/watch?v=abc123"
        );
        assert_eq!(
            normalize_url("https://www.youtube.com/watch?v=abc&list=PL1&index=4&t=10s"),
            "https://www.youtube.com/watch?v=abc"
        );
    }

    #[test]
    fn test_normalize_url_passthrough() {
        let urls = [
            "https://youtube.com/watch?v=abc123",
            "https://youtu.be/abc123?t=42",
            "not even a url",
            "",
        ];
        for url in urls {
            assert_eq!(normalize_url(url), url);
        }
    }

    #[test]
    fn test_normalize_url_idempotent() {
        let urls = [
            "https://youtube.com/watch?v=abc123&list=PL999",
            "https://youtube.com/watch?v=abc123&list=PL999&list=PL2",
            "https://youtube.com/watch?v=abc123",
            "&list=",
        ];
        for url in urls {
            let once = normalize_url(url);
            assert_eq!(normalize_url(&once), once);
            assert!(!once.contains(PLAYLIST_MARKER));
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not-a-url").is_err());
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(212.4), "03:32");
        assert_eq!(format_duration(3661.0), "1:01:01");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(Some(1234)), "1234");
        assert_eq!(format_count(None), "N/A");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("What? A \"video\": part 1/2"), "What_ A _video__ part 1_2");
        assert_eq!(sanitize_filename("Ünïcödé title"), "Ünïcödé title");
        assert_eq!(sanitize_filename("trailing dots..."), "trailing dots");
        assert_eq!(sanitize_filename("  "), "video");
    }

    #[tokio::test]
    async fn test_race_interrupt_prefers_interrupt() {
        let raced = race_interrupt(std::future::pending::<u32>(), std::future::ready(())).await;
        assert_eq!(raced, None);

        // Both ready: the interrupt still wins
        let raced = race_interrupt(std::future::ready(7), std::future::ready(())).await;
        assert_eq!(raced, None);
    }

    #[tokio::test]
    async fn test_race_interrupt_passes_output_through() {
        let raced = race_interrupt(async { 7 }, std::future::pending::<()>()).await;
        assert_eq!(raced, Some(7));
    }

    #[test]
    fn test_format_selector() {
        assert_eq!(
            format_selector(1080),
            "bestvideo[height<=1080]+bestaudio/best[height<=1080]"
        );
    }
}
