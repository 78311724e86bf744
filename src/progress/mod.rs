use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;

const FINISHED_NOTICE: &str = "✅ Download complete! Merging streams with FFmpeg...";

/// One progress notification from the media fetcher
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        total_bytes_estimate: Option<u64>,
    },
    Finished {
        downloaded_bytes: u64,
    },
}

impl ProgressEvent {
    /// Percentage complete, if the total size is known
    pub fn percent(&self) -> Option<f64> {
        match self {
            ProgressEvent::Downloading {
                downloaded_bytes,
                total_bytes,
                total_bytes_estimate,
            } => {
                let total = total_bytes.or(*total_bytes_estimate).filter(|t| *t > 0)?;
                Some(*downloaded_bytes as f64 / total as f64 * 100.0)
            }
            ProgressEvent::Finished { .. } => None,
        }
    }
}

/// Receives progress events while a download runs.
///
/// Called inline by the fetcher, so implementations must return quickly and
/// must never panic.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Renders an in-place percentage line on the terminal
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

/// Bar resolution, tenths of a percent
const BAR_LENGTH: u64 = 1000;

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_bar() -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template("⏬ Downloading: {msg} [{bar:30.cyan/blue}]")
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = ProgressBar::new(BAR_LENGTH);
        bar.set_style(style);
        bar
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_event(&self, event: &ProgressEvent) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };

        match event {
            ProgressEvent::Downloading { .. } => {
                // Unknown total size: nothing to render for this event
                let Some(percent) = event.percent() else {
                    return;
                };

                let bar = slot.get_or_insert_with(Self::new_bar);
                bar.set_position((percent.clamp(0.0, 100.0) * 10.0) as u64);
                bar.set_message(format!("{:.1}% complete", percent));
            }
            ProgressEvent::Finished { .. } => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                }
                announce_finished(&mut std::io::stdout());
            }
        }
    }
}

/// Stdout may already be closed, e.g. when piped into `head`
fn announce_finished(out: &mut impl Write) {
    if let Err(e) = writeln!(out, "{}", FINISHED_NOTICE) {
        tracing::debug!("Could not print progress notice: {}", e);
    }
}
