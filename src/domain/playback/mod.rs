//! Playback domain module

mod clock;
mod locator;

pub use clock::{clamp_time, PlaybackClock};
pub use locator::{LocatorKind, SourceLocator};

/// Seconds before the end within which an `ended` signal counts as a
/// natural end of playback.
pub const END_TOLERANCE_SECS: f64 = 0.1;

/// Observable playback state. Subscribers only ever see values of this type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub is_ready: bool,
    pub current_time: f64,
    pub duration: f64,
}

impl PlaybackSnapshot {
    /// Fraction of the clip played, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        }
    }
}
