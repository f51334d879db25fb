//! Decoded PCM audio held by the playback engine

/// Decoded audio: interleaved `f32` samples plus their layout.
///
/// Immutable once built. The playback engine replaces it wholesale on
/// every successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedAudio {
    /// Build from interleaved samples. A zero channel count or sample rate
    /// is treated as 1 so duration math never divides by zero.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Interleaved samples starting at `offset` seconds, aligned to a frame.
    /// Offsets past the end yield an empty slice.
    pub fn samples_from(&self, offset: f64) -> &[f32] {
        let frame = (offset.max(0.0) * self.sample_rate as f64).floor() as usize;
        let start = frame
            .min(self.frame_count())
            .saturating_mul(self.channels as usize);
        &self.samples[start..]
    }

    /// Static waveform for review: RMS amplitude of `bars` equal slices.
    pub fn waveform(&self, bars: usize) -> Vec<f32> {
        if bars == 0 {
            return Vec::new();
        }
        let frames = self.frame_count();
        let channels = self.channels as usize;
        let frames_per_bar = frames / bars;

        (0..bars)
            .map(|i| {
                let start = i * frames_per_bar * channels;
                let end = ((i + 1) * frames_per_bar * channels).min(self.samples.len());
                if start >= end {
                    return 0.0;
                }
                let slice = &self.samples[start..end];
                let sum_squares: f32 = slice.iter().map(|s| s * s).sum();
                (sum_squares / slice.len() as f32).sqrt()
            })
            .collect()
    }
}
