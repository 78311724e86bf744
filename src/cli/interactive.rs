use anyhow::{Context, Result};
use std::io::Write;

use crate::download::DownloadPipeline;
use crate::output;
use crate::tools;
use crate::utils::{interrupted, normalize_url, validate_url};

/// What the user typed at the prompt
#[derive(Debug, PartialEq, Eq)]
pub enum PromptInput {
    Quit,
    Invalid(String),
    Url(String),
}

/// Classify one line of input
pub fn classify_input(line: &str) -> PromptInput {
    let line = line.trim();

    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return PromptInput::Quit;
    }

    match validate_url(line) {
        Ok(_) => PromptInput::Url(line.to_string()),
        Err(e) => PromptInput::Invalid(e.to_string()),
    }
}

/// Prompt for URLs until the user quits; failed attempts never end the loop
pub async fn run(pipeline: &DownloadPipeline) -> Result<()> {
    output::print_banner();

    // Advisory only: the per-download gate still applies
    let missing = tools::missing_prerequisites(pipeline.prerequisites()).await;
    if !missing.is_empty() {
        output::print_dependency_warning(&missing);
    }

    loop {
        let Some(line) = read_line("\n📋 Enter video URL: ").await? else {
            break;
        };

        match classify_input(&line) {
            PromptInput::Quit => break,
            PromptInput::Invalid(reason) => {
                println!("❌ Invalid URL ({}). Please enter a valid video URL", reason);
            }
            PromptInput::Url(url) => {
                println!("\n🔄 Using clean URL: {}", normalize_url(&url));
                let success = pipeline.run(&url).await;
                output::print_attempt_result(success);
            }
        }
    }

    Ok(())
}

/// Read one line from stdin; `None` on end of input
async fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush().context("Failed to write prompt")?;

    let reader = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map(|read| (read > 0).then_some(line))
    });

    tokio::select! {
        line = reader => Ok(line.context("Input reader stopped")?.context("Failed to read input")?),
        _ = interrupted() => {
            println!("\n👋 Bye!");
            // The blocked stdin reader cannot be joined, so leave right away
            std::process::exit(0);
        }
    }
}
