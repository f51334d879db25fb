//! Playback position derived from an audio clock reading
//!
//! Position is never accumulated per frame. It is stored as the offset to
//! resume from plus the clock reading taken when playback last started,
//! and derived by subtraction.

/// Clamp `time` into `[0, duration]`, mapping NaN to 0.
pub fn clamp_time(time: f64, duration: f64) -> f64 {
    if time.is_nan() {
        return 0.0;
    }
    time.max(0.0).min(duration.max(0.0))
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackClock {
    offset: f64,
    started_at: Option<f64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical position to resume from
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Clock reading captured when playback last started
    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Current position given the clock reading `now`
    pub fn current(&self, now: f64, duration: f64) -> f64 {
        let raw = match self.started_at {
            Some(started) => now - started + self.offset,
            None => self.offset,
        };
        clamp_time(raw, duration)
    }

    /// Begin running from the stored offset
    pub fn start(&mut self, now: f64) {
        self.started_at = Some(now);
    }

    /// Stop running and keep the derived position as the new offset
    pub fn freeze(&mut self, now: f64, duration: f64) -> f64 {
        self.offset = self.current(now, duration);
        self.started_at = None;
        self.offset
    }

    /// Move to `time` (clamped) and stop running
    pub fn seek(&mut self, time: f64, duration: f64) -> f64 {
        self.offset = clamp_time(time, duration);
        self.started_at = None;
        self.offset
    }

    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.started_at = None;
    }
}
