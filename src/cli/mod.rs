use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod interactive;

#[derive(Parser)]
#[command(
    name = "vidgrab",
    about = "vidgrab - Download videos with yt-dlp and merge them with FFmpeg",
    version,
    long_about = "A CLI tool that downloads a single video (never a whole playlist), merges the \
                  best video and audio streams up to 1080p into one MP4 file and moves it into \
                  an output directory."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators and video details
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory receiving finished downloads
    #[arg(short, long, global = true, value_name = "DIR", env = "VIDGRAB_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long, global = true, value_name = "PATH", env = "VIDGRAB_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the yt-dlp binary
    #[arg(long, global = true, value_name = "PATH", env = "VIDGRAB_YT_DLP")]
    pub yt_dlp: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Download a single video
    Download {
        /// Video URL; playlist parameters are ignored
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Prompt for URLs until told to exit (default)
    Interactive,

    /// Check that FFmpeg and yt-dlp are installed
    Check,

    /// Print a URL with its playlist parameters removed
    CleanUrl {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
