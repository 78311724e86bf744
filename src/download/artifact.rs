//! Finding the finished file among the fetcher's scratch output.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::utils::sanitize_filename;

/// Whether `name` looks like a finished `container` file rather than an intermediate
pub fn is_final_candidate(name: &str, container: &str) -> bool {
    let lower = name.to_lowercase();
    let extension = format!(".{}", container.to_lowercase());

    let Some(stem) = lower.strip_suffix(&extension) else {
        return false;
    };

    if stem.is_empty() || stem.ends_with(".temp") || stem.ends_with(".part") {
        return false;
    }

    // Per-format streams before merging, e.g. "title.f137.mp4"
    let format_stream = stem
        .rsplit_once('.')
        .map(|(_, last)| {
            last.len() > 1 && last.starts_with('f') && last[1..].chars().all(|c| c.is_ascii_digit())
        })
        .unwrap_or(false);

    !format_stream
}

/// Locate the final artifact in `working_dir`.
///
/// A path reported by the fetcher wins if it still exists. Otherwise the
/// directory's immediate entries are scanned; among several candidates the
/// most recently modified one is chosen, ties broken by the greater name.
pub async fn locate_artifact(
    working_dir: &Path,
    reported: Option<&Path>,
    container: &str,
) -> io::Result<Option<PathBuf>> {
    if let Some(path) = reported {
        if tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Ok(Some(path.to_path_buf()));
        }
        tracing::debug!(
            "Reported file {} is gone, scanning {}",
            path.display(),
            working_dir.display()
        );
    }

    let mut entries = tokio::fs::read_dir(working_dir).await?;
    let mut best: Option<(SystemTime, String, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_final_candidate(&name, container) {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let newer = match &best {
            Some((best_modified, best_name, _)) => (modified, &name) > (*best_modified, best_name),
            None => true,
        };
        if newer {
            best = Some((modified, name, entry.path()));
        }
    }

    Ok(best.map(|(_, _, path)| path))
}

/// Output file name for an artifact: sanitized stem, forced container extension
pub fn output_file_name(artifact: &Path, container: &str) -> String {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    format!("{}.{}", sanitize_filename(&stem), container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_final_candidates() {
        assert!(is_final_candidate("My Video.mp4", "mp4"));
        assert!(is_final_candidate("Shouting.MP4", "mp4"));
        assert!(is_final_candidate("v1.2 release.mp4", "mp4"));
        assert!(is_final_candidate("the f word.mp4", "mp4"));
    }

    #[test]
    fn test_intermediate_files_are_rejected() {
        assert!(!is_final_candidate("My Video.temp.mp4", "mp4"));
        assert!(!is_final_candidate("My Video.f137.mp4", "mp4"));
        assert!(!is_final_candidate("My Video.mp4.part", "mp4"));
        assert!(!is_final_candidate("My Video.part.mp4", "mp4"));
        assert!(!is_final_candidate("My Video.webm", "mp4"));
        assert!(!is_final_candidate(".mp4", "mp4"));
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("tmp/What? Now.mp4"), "mp4"),
            "What_ Now.mp4"
        );
        assert_eq!(output_file_name(Path::new("tmp/clip.mkv"), "mp4"), "clip.mp4");
    }

    #[tokio::test]
    async fn test_reported_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("reported.mp4");
        fs_err::write(&reported, b"x").unwrap();
        fs_err::write(dir.path().join("other.mp4"), b"x").unwrap();

        let found = locate_artifact(dir.path(), Some(&reported), "mp4").await.unwrap();
        assert_eq!(found, Some(reported));
    }

    #[tokio::test]
    async fn test_scan_skips_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("clip.temp.mp4"), b"x").unwrap();
        fs_err::write(dir.path().join("clip.f248.webm"), b"x").unwrap();
        fs_err::write(dir.path().join("clip.mp4"), b"x").unwrap();
        fs_err::create_dir(dir.path().join("folder.mp4")).unwrap();

        let missing = dir.path().join("gone.mp4");
        let found = locate_artifact(dir.path(), Some(&missing), "mp4").await.unwrap();
        assert_eq!(found, Some(dir.path().join("clip.mp4")));
    }

    #[tokio::test]
    async fn test_scan_prefers_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let older = dir.path().join("zzz older.mp4");
        let newer = dir.path().join("aaa newer.mp4");
        fs_err::write(&older, b"x").unwrap();
        fs_err::write(&newer, b"x").unwrap();

        let base = SystemTime::now() - Duration::from_secs(60);
        std::fs::File::options().write(true).open(&older).unwrap().set_modified(base).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&newer)
            .unwrap()
            .set_modified(base + Duration::from_secs(30))
            .unwrap();

        let found = locate_artifact(dir.path(), None, "mp4").await.unwrap();
        assert_eq!(found, Some(newer));
    }

    #[tokio::test]
    async fn test_scan_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locate_artifact(dir.path(), None, "mp4").await.unwrap(), None);
    }
}
