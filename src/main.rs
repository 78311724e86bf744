use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidgrab::cli::{interactive, Cli, Commands};
use vidgrab::tools::{Prerequisite, ToolProbe, ToolStatus};
use vidgrab::utils::{normalize_url, validate_url};
use vidgrab::{output, Config, DownloadPipeline};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "vidgrab=debug" } else { "vidgrab=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command.clone().unwrap_or(Commands::Interactive) {
        Commands::CleanUrl { url } => {
            println!("{}", normalize_url(&url));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download { url } => {
            validate_url(&url)?;
            let config = load_config(&cli).await?;
            println!("🔄 Using clean URL: {}", normalize_url(&url));

            let pipeline = DownloadPipeline::new(&config, cli.quiet);
            if pipeline.run(&url).await {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Interactive => {
            let config = load_config(&cli).await?;
            let pipeline = DownloadPipeline::new(&config, cli.quiet);
            interactive::run(&pipeline).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let config = load_config(&cli).await?;
            let probes = [
                ToolProbe::ffmpeg(config.tools.ffmpeg_path.as_deref()),
                ToolProbe::yt_dlp(config.tools.yt_dlp_path.as_deref()),
            ];

            let mut missing = Vec::new();
            for probe in &probes {
                let status = probe.check().await;
                output::print_tool_status(probe.name(), &status);
                if let ToolStatus::Missing { reason } = status {
                    missing.push((probe.name().to_string(), reason));
                }
            }

            if missing.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                output::print_dependency_warning(&missing);
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Config { show } => {
            let config = load_config(&cli).await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Run with --show to print the current values");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load the configuration file and apply command-line overrides
async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().await?;

    if let Some(dir) = &cli.output_dir {
        config.download.output_dir = dir.clone();
    }
    if let Some(path) = &cli.ffmpeg {
        config.tools.ffmpeg_path = Some(path.clone());
    }
    if let Some(path) = &cli.yt_dlp {
        config.tools.yt_dlp_path = Some(path.clone());
    }

    Ok(config)
}
