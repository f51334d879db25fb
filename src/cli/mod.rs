//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, terminal waveforms,
//! and the record/play runners.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod presenter;
pub mod waveform;

// Re-export commonly used types
pub use app::{run_formats, run_play, run_record, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction, RecordArgs, RecordOptions};
pub use presenter::Presenter;
