//! Audio capture port interfaces
//!
//! Mirrors the split between a live device stream (owns the hardware
//! tracks) and the engine that encodes it into chunks.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::error::UnsupportedFormatError;
use crate::domain::recording::{CaptureConstraints, EncodingFormat, InvalidStateTransition};

/// Recording errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordingError {
    #[error("Could not acquire audio input: {0}")]
    Acquisition(String),

    #[error("No supported recording format: {0}")]
    UnsupportedFormat(#[from] UnsupportedFormatError),

    #[error("No audio data was captured")]
    NoData,

    #[error("No recording in progress")]
    NotActive,

    #[error("Recording attempt was superseded by a newer request")]
    Superseded,

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),
}

/// Events a capture engine delivers to its controller, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A slice of encoded audio; may be empty
    Data(Vec<u8>),
    /// The engine finished finalizing after `stop`; no events follow
    Stopped,
    /// The engine failed and will deliver nothing more
    Error(String),
}

pub type CaptureEventSender = mpsc::UnboundedSender<CaptureEvent>;

/// An input device chosen for capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDevice {
    /// Identifier passed back in constraints; `None` is the platform default
    pub id: Option<String>,
    /// Human-readable name, when the platform exposes one
    pub label: Option<String>,
}

/// A live device stream. Owns the hardware tracks until `stop_tracks`.
pub trait InputStream: Send + Sync {
    /// Whether the stream is still delivering audio
    fn is_active(&self) -> bool;

    /// Name of the device behind the stream
    fn label(&self) -> Option<String>;

    /// Recent peak amplitudes (0.0 to 1.0), oldest first, for live waveforms
    fn levels(&self) -> Vec<f32>;

    /// Stop every hardware track. Idempotent.
    fn stop_tracks(&self);

    /// Concrete stream, for the input that opened it to build an engine
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Encodes a stream into [`CaptureEvent`]s.
///
/// Implementations may spawn tokio tasks from `start`, so it must be
/// called from within a runtime.
pub trait CaptureEngine: Send {
    /// Begin delivering `Data` events every `timeslice`
    fn start(&mut self, timeslice: Duration) -> Result<(), RecordingError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Flush remaining data and deliver `Stopped`. Idempotent.
    fn stop(&mut self);
}

/// Port for the platform's audio input
#[async_trait]
pub trait AudioInput: Send + Sync {
    /// Find the preferred device, falling back to the platform default
    async fn resolve_device(&self, preferred: Option<&str>) -> Result<InputDevice, RecordingError>;

    /// Open a capture stream with the given constraints
    async fn open_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn InputStream>, RecordingError>;

    /// Whether this input can encode `format`
    fn supports_format(&self, format: &EncodingFormat) -> bool;

    /// Create an engine that records `stream` as `format`
    fn create_engine(
        &self,
        stream: Arc<dyn InputStream>,
        format: EncodingFormat,
        events: CaptureEventSender,
    ) -> Result<Box<dyn CaptureEngine>, RecordingError>;
}
