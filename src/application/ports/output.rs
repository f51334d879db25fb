//! Audio output port interfaces

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::audio::DecodedAudio;

/// Playback errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Failed to load audio: {0}")]
    Load(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Load was superseded by a newer request")]
    Superseded,
}

/// One-shot voice bound to a decoded buffer. Dropping it without `stop`
/// leaves the audio playing until the end of the buffer.
pub trait PlaybackNode: Send {
    /// Silence the node. The `ended` signal must not fire afterwards.
    fn stop(&mut self);
}

/// Resource that decodes audio and drives output hardware.
pub trait DecodeContext: Send {
    /// Decode encoded bytes into PCM. CPU-bound; callers run it on a
    /// blocking thread.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, PlaybackError>;

    /// Monotonic clock in seconds. Does not advance while suspended.
    fn now(&self) -> f64;

    fn is_suspended(&self) -> bool;

    fn resume(&mut self) -> Result<(), PlaybackError>;

    fn suspend(&mut self);

    /// Start a new node at `offset` seconds. `ended` fires once when the
    /// node plays out to the end of the buffer.
    fn start_node(
        &mut self,
        buffer: Arc<DecodedAudio>,
        offset: f64,
        ended: oneshot::Sender<()>,
    ) -> Result<Box<dyn PlaybackNode>, PlaybackError>;

    /// Release the output device. Idempotent.
    fn close(&mut self);
}

/// Port for the platform's audio output
pub trait AudioOutput: Send + Sync {
    fn open_context(&self) -> Result<Box<dyn DecodeContext>, PlaybackError>;
}
