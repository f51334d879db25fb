//! App runners for the record, play and formats subcommands

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use colored::*;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};

use crate::application::ports::{AudioInput, ConfigStore};
use crate::application::{
    BlobRegistry, PlaybackEngine, RecorderConfig, RecordingController,
};
use crate::domain::audio::AudioBlob;
use crate::domain::config::AppConfig;
use crate::domain::recording::{format, EncodingFormat};
use crate::infrastructure::capture::wav;
use crate::infrastructure::{CpalInput, XdgConfigStore};

use super::args::RecordOptions;
use super::presenter::Presenter;
use super::waveform;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Redraw interval for the recording status line
const RECORD_REFRESH: TokioDuration = TokioDuration::from_millis(100);

/// Bars in the static waveform shown before playback
const STATIC_WAVEFORM_BARS: usize = 60;

/// Commands typed while recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCommand {
    Stop,
    TogglePause,
    Unknown(String),
}

/// Parse a line typed while recording: Enter stops, `p` toggles pause
pub fn parse_record_command(line: &str) -> RecordCommand {
    match line.trim().to_lowercase().as_str() {
        "" | "s" | "stop" => RecordCommand::Stop,
        "p" | "pause" | "resume" => RecordCommand::TogglePause,
        other => RecordCommand::Unknown(other.to_string()),
    }
}

/// Commands typed while playing
#[derive(Debug, Clone, PartialEq)]
pub enum PlayCommand {
    Toggle,
    Seek(f64),
    Quit,
    Unknown(String),
}

/// Parse a line typed while playing: Enter/`p` toggles, `s <secs>` seeks, `q` quits
pub fn parse_play_command(line: &str) -> PlayCommand {
    let trimmed = line.trim();
    let mut parts = trimmed.split_whitespace();
    match parts.next().map(str::to_lowercase).as_deref() {
        None | Some("p") => PlayCommand::Toggle,
        Some("q") | Some("quit") => PlayCommand::Quit,
        Some("s") | Some("seek") => match parts.next().and_then(|t| t.parse::<f64>().ok()) {
            Some(secs) => PlayCommand::Seek(secs),
            None => PlayCommand::Unknown(trimmed.to_string()),
        },
        Some(_) => PlayCommand::Unknown(trimmed.to_string()),
    }
}

/// Forward stdin lines until EOF. Reads on a plain thread so a pending
/// read never holds up runtime shutdown.
fn spawn_stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

enum RecordOutcome {
    Stop,
    Discard,
    Failed,
}

/// Record from the microphone until stopped, then save the clip
pub async fn run_record(options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();
    let max_secs = options.max_duration.as_secs();

    let controller = RecordingController::new(
        Arc::new(CpalInput::new()),
        BlobRegistry::global(),
        RecorderConfig {
            preferred_device: options.device.clone(),
            ..Default::default()
        },
    );

    presenter.start_spinner("Opening microphone...");
    if let Err(e) = controller.start_recording().await {
        presenter.spinner_fail("Could not start recording");
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }
    presenter.stop_spinner();

    let format_name = controller.format().map(|f| f.mime).unwrap_or("unknown");
    presenter.info(&format!(
        "Recording from {} ({})",
        controller.device_label(),
        format_name
    ));
    presenter.info("Press Enter to stop, p + Enter to pause/resume, Ctrl+C to discard");
    presenter.start_spinner("Recording...");

    let mut input = spawn_stdin_lines();
    let mut stdin_open = true;
    let mut frames = interval(RECORD_REFRESH);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break RecordOutcome::Discard,
            line = input.recv(), if stdin_open => match line {
                Some(line) => match parse_record_command(&line) {
                    RecordCommand::Stop => break RecordOutcome::Stop,
                    RecordCommand::TogglePause => {
                        if let Err(e) = controller.toggle_pause_resume() {
                            presenter.warn(&e.to_string());
                        }
                    }
                    RecordCommand::Unknown(cmd) => {
                        presenter.warn(&format!("Unknown command '{}'", cmd));
                    }
                },
                None => stdin_open = false,
            },
            _ = frames.tick() => {
                let view = controller.view();
                if !view.status.is_active() {
                    break RecordOutcome::Failed;
                }
                if options.max_duration.is_reached(view.elapsed_seconds) {
                    break RecordOutcome::Stop;
                }
                let levels = controller
                    .live_stream()
                    .map(|stream| stream.levels())
                    .unwrap_or_default();
                let line = presenter.format_recording(&view, max_secs, &levels);
                presenter.update_spinner(&line);
            }
        }
    };

    match outcome {
        RecordOutcome::Discard => {
            controller.release_resources();
            presenter.spinner_fail("Recording discarded");
            ExitCode::from(EXIT_ERROR)
        }
        RecordOutcome::Failed => {
            let message = controller
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Recording ended unexpectedly".to_string());
            presenter.spinner_fail("Recording failed");
            presenter.error(&message);
            ExitCode::from(EXIT_ERROR)
        }
        RecordOutcome::Stop => {
            let elapsed = controller.elapsed_seconds();
            let encoding = controller.format();
            match controller.stop_recording().await {
                Ok(blob) => {
                    presenter.spinner_success(&format!(
                        "Recorded {}s ({})",
                        elapsed,
                        blob.human_readable_size()
                    ));
                    save_recording(&presenter, &blob, encoding, &options.output_dir).await
                }
                Err(e) => {
                    presenter.spinner_fail("Recording failed");
                    presenter.error(&e.to_string());
                    ExitCode::from(EXIT_ERROR)
                }
            }
        }
    }
}

async fn save_recording(
    presenter: &Presenter,
    blob: &AudioBlob,
    encoding: Option<EncodingFormat>,
    dir: &Path,
) -> ExitCode {
    let encoding = match encoding {
        Some(encoding) => encoding,
        None => match format::by_mime(blob.mime_type()) {
            Ok(encoding) => encoding,
            Err(e) => {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
        },
    };

    match write_recording(blob, &encoding, dir).await {
        Ok(path) => {
            presenter.success(&format!("Saved {}", path.display()));
            presenter.output(&path.to_string_lossy());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&format!("Failed to save recording: {}", e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Seal and write `blob` into `dir` under a generated name
pub async fn write_recording(
    blob: &AudioBlob,
    encoding: &EncodingFormat,
    dir: &Path,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format::generate_filename(encoding, Utc::now()));
    tokio::fs::write(&path, wav::seal_streaming_header(blob.to_vec())).await?;
    tracing::info!(path = %path.display(), bytes = blob.size_bytes(), "recording saved");
    Ok(path)
}

/// Play `locator` with keyboard controls until it ends or the user quits
pub async fn run_play(locator: String) -> ExitCode {
    let mut presenter = Presenter::new();
    let engine = PlaybackEngine::global();

    presenter.start_spinner(&format!("Loading {}...", locator));
    if let Err(e) = engine.load_audio(locator.as_str()).await {
        presenter.spinner_fail("Could not load audio");
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }
    presenter.stop_spinner();

    let duration = engine.snapshot().duration;
    let bars = waveform::render_static(&engine.waveform(STATIC_WAVEFORM_BARS));
    presenter.output(&bars.cyan().to_string());
    presenter.info(&format!("Duration {:.1}s", duration));
    presenter.info("Enter or p toggles, s <secs> seeks, q quits");

    let changed = Arc::new(Notify::new());
    let notifier = Arc::clone(&changed);
    let _subscription = engine.subscribe(move || notifier.notify_one());

    if let Err(e) = engine.play() {
        presenter.error(&e.to_string());
        engine.dispose();
        return ExitCode::from(EXIT_ERROR);
    }
    let status = presenter.format_playback(&engine.snapshot());
    presenter.start_spinner(&status);

    let mut input = spawn_stdin_lines();
    let mut stdin_open = true;
    let mut user_paused = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            line = input.recv(), if stdin_open => match line {
                Some(line) => {
                    let result = match parse_play_command(&line) {
                        PlayCommand::Toggle => {
                            let toggled = engine.toggle();
                            user_paused = !engine.snapshot().is_playing;
                            toggled
                        }
                        PlayCommand::Seek(secs) => engine.seek(secs),
                        PlayCommand::Quit => break,
                        PlayCommand::Unknown(cmd) => {
                            presenter.warn(&format!("Unknown command '{}'", cmd));
                            Ok(())
                        }
                    };
                    if let Err(e) = result {
                        presenter.error(&e.to_string());
                        break;
                    }
                }
                None => stdin_open = false,
            },
            _ = changed.notified() => {
                let snapshot = engine.snapshot();
                presenter.update_spinner(&presenter.format_playback(&snapshot));
                if !snapshot.is_playing && !user_paused {
                    break;
                }
            }
        }
    }

    engine.dispose();
    presenter.spinner_success("Done");
    ExitCode::from(EXIT_SUCCESS)
}

/// Print the format table with a marker for what the input can record
pub fn run_formats(presenter: &Presenter) -> ExitCode {
    let input = CpalInput::new();

    for entry in format::by_priority() {
        let marker = if input.supports_format(&entry) {
            "✓".green()
        } else {
            "-".dimmed()
        };
        presenter.output(&format!(
            "{} {:<5} {:<24} {:>4} kbps  ~{} KB/min",
            marker,
            entry.extension,
            entry.mime,
            entry.bitrate_kbps,
            entry.estimate_size_bytes(60) / 1000
        ));
    }

    let devices = CpalInput::device_names();
    if devices.is_empty() {
        presenter.warn("No input devices found");
    } else {
        presenter.info("Input devices:");
        for name in devices {
            presenter.output(&format!("  {}", name));
        }
    }

    ExitCode::from(EXIT_SUCCESS)
}

/// Load and merge configuration: defaults < file < CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    AppConfig::defaults().merge(file_config).merge(cli_config)
}
