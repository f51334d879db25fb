//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod config;
pub mod fetcher;
pub mod output;

// Re-export common types
pub use capture::{
    AudioInput, CaptureEngine, CaptureEvent, CaptureEventSender, InputDevice, InputStream,
    RecordingError,
};
pub use config::ConfigStore;
pub use fetcher::SourceFetcher;
pub use output::{AudioOutput, DecodeContext, PlaybackError, PlaybackNode};
