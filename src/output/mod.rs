//! User-facing console messages.

use console::style;
use std::time::Duration;

use crate::download::{DownloadReport, Relocation};
use crate::fetch::VideoMetadata;
use crate::tools::ToolStatus;
use crate::utils::{format_count, format_duration, format_file_size};
use crate::DownloadError;

const RULE_WIDTH: usize = 60;

pub fn print_banner() {
    println!("\n{}", "=".repeat(RULE_WIDTH));
    println!("{:^width$}", "🎬 Video Downloader", width = RULE_WIDTH);
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Enter a video URL to download it");
    println!("Type 'exit' or press Ctrl+C to quit\n");
}

/// Advisory shown at startup when tools are missing
pub fn print_dependency_warning(missing: &[(String, String)]) {
    println!("\n{}", style("❌ CRITICAL: required tools not found!").red().bold());
    for (tool, reason) in missing {
        println!("   • {}: {}", tool, reason);
    }
    print_remediation();
    println!("\n{}", "=".repeat(RULE_WIDTH));
}

fn print_remediation() {
    println!("   Please install FFmpeg and add it to your system PATH");
    println!("   Download: https://www.gyan.dev/ffmpeg/builds/");
    println!("   Extract to: C:\\ffmpeg");
    println!("   Add to PATH: C:\\ffmpeg\\bin");
    println!("   yt-dlp: https://github.com/yt-dlp/yt-dlp#installation");
    println!("   Or set tools.ffmpeg_path / tools.yt_dlp_path in the config file");
}

pub fn print_tool_status(name: &str, status: &ToolStatus) {
    match status {
        ToolStatus::Available { version } => {
            println!("{} {}: {}", style("✅").green(), name, version)
        }
        ToolStatus::Missing { reason } => {
            println!("{} {}: {}", style("❌").red(), name, reason)
        }
    }
}

pub fn print_fetching_info() {
    println!("🔍 Fetching video information...");
}

pub fn print_metadata(metadata: &VideoMetadata, fetch_time: Duration) {
    println!("✅ Video info fetched in {:.1} seconds\n", fetch_time.as_secs_f64());
    println!("📺 Title: {}", metadata.title);
    if let Some(uploader) = &metadata.uploader {
        println!("👤 Uploader: {}", uploader);
    }
    match metadata.duration {
        Some(seconds) => println!("⏱️  Duration: {}", format_duration(seconds)),
        None => println!("⏱️  Duration: Unknown"),
    }
    println!(
        "📏 Resolution: {}",
        metadata.resolution.as_deref().unwrap_or("Unknown")
    );
    println!("👀 Views: {}", format_count(metadata.view_count));
    println!("👍 Likes: {}", format_count(metadata.like_count));
}

pub fn print_download_start() {
    println!("\n⬇️  Starting download... (press Ctrl+C to cancel)");
}

pub fn print_report(report: &DownloadReport) {
    let file_name = report
        .saved_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.saved_path.display().to_string());
    let size = fs_err::metadata(&report.saved_path)
        .map(|m| format!(" ({})", format_file_size(m.len())))
        .unwrap_or_default();

    match report.relocation {
        Relocation::Moved => println!("\n💾 Saved as: {}{}", file_name, size),
        Relocation::CopiedFallback => {
            println!("\n⚠️  Used copy fallback: {}{}", file_name, size)
        }
    }

    if !report.cleanup_failures.is_empty() {
        println!(
            "{}",
            style(format!(
                "⚠️  Could not remove {} temporary item(s):",
                report.cleanup_failures.len()
            ))
            .yellow()
        );
        for path in &report.cleanup_failures {
            println!("   • {}", path.display());
        }
    }
}

pub fn print_failure(error: &DownloadError) {
    match error {
        DownloadError::DependencyMissing { tool, reason } => {
            println!("\n{}", style(format!("❌ {} not found! ({})", tool, reason)).red());
            print_remediation();
        }
        DownloadError::MetadataFetch(_) | DownloadError::Download(_) => {
            println!("\n{}", style(format!("❌ {}", error)).red());
        }
        DownloadError::Cancelled => println!("\n❌ Download canceled by user"),
        DownloadError::ArtifactNotFound { working_dir } => {
            println!("\n{}", style("❌ Final merged file not found").red());
            println!("   Intermediate files kept in: {}", working_dir.display());
        }
        DownloadError::Io { .. } => {
            println!("\n{}", style(format!("🔥 Unexpected error: {}", error)).red());
        }
    }
}

/// Separator block closing one interactive attempt
pub fn print_attempt_result(success: bool) {
    println!("\n{}", "-".repeat(RULE_WIDTH));
    if success {
        println!("{}", style("✅ Download completed successfully!").green());
    } else {
        println!("{}", style("❌ Download failed. See error above for details").red());
    }
    println!("{}", "-".repeat(RULE_WIDTH));
}
