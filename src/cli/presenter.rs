//! CLI presenter for output formatting

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::RecordingView;
use crate::domain::playback::PlaybackSnapshot;
use crate::domain::recording::RecordingStatus;

use super::waveform;

/// Columns of live waveform drawn next to the recording timer
const LIVE_WAVEFORM_WIDTH: usize = 32;

/// Presenter for CLI output formatting
#[derive(Default)]
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Format a progress bar for `elapsed` of `total` seconds
    pub fn format_progress(&self, elapsed: f64, total: f64) -> String {
        let percent = if total > 0.0 {
            (elapsed / total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let bar_width = 20;
        let filled = ((percent / 100.0) * bar_width as f64) as usize;
        let empty = bar_width - filled;

        format!(
            "[{}{}] {:>5.1}s / {:.1}s",
            "█".repeat(filled).cyan(),
            "░".repeat(empty),
            elapsed,
            total
        )
    }

    /// Status line for an ongoing recording. The live waveform is only
    /// drawn while actually recording.
    pub fn format_recording(&self, view: &RecordingView, max_secs: u64, levels: &[f32]) -> String {
        let progress = self.format_progress(view.elapsed_seconds as f64, max_secs as f64);
        match view.status {
            RecordingStatus::Recording => format!(
                "{} {} {}",
                "Recording".red().bold(),
                progress,
                waveform::render_levels(levels, LIVE_WAVEFORM_WIDTH).cyan()
            ),
            RecordingStatus::Paused => format!("{} {}", "Paused".yellow().bold(), progress),
            other => format!("{} {}", other.as_str(), progress),
        }
    }

    /// Status line for playback
    pub fn format_playback(&self, snapshot: &PlaybackSnapshot) -> String {
        let state = if snapshot.is_playing {
            "Playing".green().bold()
        } else {
            "Paused".yellow().bold()
        };
        format!(
            "{} {}",
            state,
            self.format_progress(snapshot.current_time, snapshot.duration)
        )
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}
