//! Capture constraint profiles per platform

/// Platform families with distinct capture tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Apple audio stacks already apply their own voice processing
    Apple,
    Other,
}

impl Platform {
    /// Platform of the running binary
    pub const fn current() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::Apple
        } else {
            Self::Other
        }
    }
}

/// Constraints handed to the audio input when opening a stream.
/// Hints the device cannot honor are ignored by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Input device to open; `None` means the platform default
    pub device_id: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
}

impl CaptureConstraints {
    /// Resolve the constraint profile for `platform`
    pub fn for_platform(platform: Platform, device_id: Option<String>) -> Self {
        match platform {
            Platform::Apple => Self {
                device_id,
                echo_cancellation: true,
                noise_suppression: false,
                auto_gain_control: false,
                sample_rate: None,
                channel_count: Some(1),
            },
            Platform::Other => Self {
                device_id,
                echo_cancellation: true,
                noise_suppression: true,
                auto_gain_control: true,
                sample_rate: Some(48_000),
                channel_count: Some(1),
            },
        }
    }
}
