//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::recording::RecordingLimit;

/// voice-memo - record, review and play back voice memos
#[derive(Parser, Debug)]
#[command(name = "voice-memo")]
#[command(version)]
#[command(about = "Record, review and play back voice memos from the terminal")]
#[command(long_about = None)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a memo from the microphone
    Record(RecordArgs),
    /// Play a recording from a file, URL or data URL
    Play {
        /// File path, file://, http(s):// or data: URL
        locator: String,
    },
    /// List recording formats and input devices
    Formats,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for the record subcommand
#[derive(Args, Debug, Default, Clone)]
pub struct RecordArgs {
    /// Maximum recording duration (e.g., 90, 45s, 2m30s, 1h)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,

    /// Directory to save the recording into
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Input device name (see `voice-memo formats`)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Parsed record options
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub max_duration: RecordingLimit,
    pub output_dir: PathBuf,
    pub device: Option<String>,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &["input_device", "recordings_dir", "max_duration"];
