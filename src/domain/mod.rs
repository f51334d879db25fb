//! Domain layer - Core recording and playback logic
//!
//! Contains value objects, state machines, and domain errors.
//! This layer has no dependencies on audio hardware or the network.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod recording;

// Re-export common types
pub use audio::{AudioBlob, DecodedAudio};
pub use config::AppConfig;
pub use error::*;
pub use playback::{PlaybackClock, PlaybackSnapshot, SourceLocator};
pub use recording::{
    CaptureConstraints, ChunkAssembler, EncodingFormat, RecordingLimit, RecordingStatus,
};
