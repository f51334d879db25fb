//! Microphone input using cpal
//!
//! The cpal stream lives on its own thread (cpal::Stream is not Send) and
//! feeds a shared PCM buffer. The capture engine drains that buffer into
//! streaming WAV chunks on a timeslice.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use super::wav;
use crate::application::lock;
use crate::application::ports::{
    AudioInput, CaptureEngine, CaptureEvent, CaptureEventSender, InputDevice, InputStream,
    RecordingError,
};
use crate::domain::recording::{CaptureConstraints, EncodingFormat};

/// Peak readings kept for the live waveform
pub const LEVEL_HISTORY: usize = 64;

/// Only container the cpal input can produce
const WAV_MIME: &str = "audio/wav";

/// State shared between the cpal callback, the stream handle and the engine
struct StreamShared {
    active: AtomicBool,
    /// Engine gate: samples are only kept while set
    capturing: AtomicBool,
    pending: Mutex<Vec<i16>>,
    levels: Mutex<VecDeque<f32>>,
}

impl StreamShared {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            capturing: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            levels: Mutex::new(VecDeque::with_capacity(LEVEL_HISTORY)),
        }
    }

    /// Called from the audio thread with mono samples
    fn accept(&self, mono: &[i16]) {
        let peak = mono
            .iter()
            .map(|s| (*s as f32 / i16::MAX as f32).abs())
            .fold(0.0f32, f32::max)
            .min(1.0);
        {
            let mut levels = lock(&self.levels);
            if levels.len() == LEVEL_HISTORY {
                levels.pop_front();
            }
            levels.push_back(peak);
        }

        if self.capturing.load(Ordering::SeqCst) {
            lock(&self.pending).extend_from_slice(mono);
        }
    }

    fn take_pending(&self) -> Vec<i16> {
        std::mem::take(&mut *lock(&self.pending))
    }
}

/// A running cpal input stream
pub struct CpalStream {
    label: Option<String>,
    sample_rate: u32,
    shared: Arc<StreamShared>,
    /// Dropping the sender releases the stream thread
    stop_tx: Mutex<Option<std_mpsc::Sender<()>>>,
}

impl CpalStream {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl InputStream for CpalStream {
    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }

    fn levels(&self) -> Vec<f32> {
        lock(&self.shared.levels).iter().copied().collect()
    }

    fn stop_tracks(&self) {
        self.shared.capturing.store(false, Ordering::SeqCst);
        self.shared.active.store(false, Ordering::SeqCst);
        if lock(&self.stop_tx).take().is_some() {
            tracing::debug!(device = ?self.label, "input stream stopped");
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// Audio input backed by the default cpal host
#[derive(Default)]
pub struct CpalInput;

impl CpalInput {
    pub fn new() -> Self {
        Self
    }

    /// Names of every input device on the default host
    pub fn device_names() -> Vec<String> {
        cpal::default_host()
            .input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    /// Find `preferred` by name, falling back to the default input device
    fn find_device(preferred: Option<&str>) -> Result<cpal::Device, RecordingError> {
        let host = cpal::default_host();

        if let Some(name) = preferred {
            let found = host
                .input_devices()
                .ok()
                .and_then(|mut devices| devices.find(|d| d.name().ok().as_deref() == Some(name)));
            match found {
                Some(device) => return Ok(device),
                None => tracing::warn!(device = name, "input device not found; using default"),
            }
        }

        host.default_input_device()
            .ok_or_else(|| RecordingError::Acquisition("no audio input device available".into()))
    }

    /// Pick a stream config close to the constraint hints
    fn get_input_config(
        device: &cpal::Device,
        constraints: &CaptureConstraints,
    ) -> Result<(StreamConfig, SampleFormat), RecordingError> {
        let default_rate = device
            .default_input_config()
            .map(|c| c.sample_rate().0)
            .map_err(|e| RecordingError::Acquisition(format!("Failed to get configs: {}", e)))?;
        let target_rate = constraints.sample_rate.unwrap_or(default_rate);
        let target_channels = constraints.channel_count.unwrap_or(1);

        let supported_configs = device
            .supported_input_configs()
            .map_err(|e| RecordingError::Acquisition(format!("Failed to get configs: {}", e)))?;

        let includes_target = |config: &cpal::SupportedStreamConfigRange| {
            config.min_sample_rate().0 <= target_rate && config.max_sample_rate().0 >= target_rate
        };

        let mut best_config: Option<cpal::SupportedStreamConfigRange> = None;
        for config in supported_configs {
            if config.sample_format() != SampleFormat::I16
                && config.sample_format() != SampleFormat::F32
            {
                continue;
            }

            let is_better = match &best_config {
                None => true,
                Some(current) => {
                    let closer_channels = config.channels().abs_diff(target_channels)
                        < current.channels().abs_diff(target_channels);
                    let better_rate = includes_target(&config) && !includes_target(current);
                    closer_channels || better_rate
                }
            };
            if is_better {
                best_config = Some(config);
            }
        }

        let config_range = best_config
            .ok_or_else(|| RecordingError::Acquisition("No suitable input config found".into()))?;

        let sample_rate = if includes_target(&config_range) {
            SampleRate(target_rate)
        } else {
            config_range.min_sample_rate()
        };

        let sample_format = config_range.sample_format();
        let config = StreamConfig {
            channels: config_range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        Ok((config, sample_format))
    }

    /// Average interleaved channels down to mono
    fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
        if channels <= 1 {
            return samples.to_vec();
        }

        samples
            .chunks(channels as usize)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / chunk.len() as i32) as i16
            })
            .collect()
    }

    fn build_stream(
        device: &cpal::Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        shared: Arc<StreamShared>,
    ) -> Result<cpal::Stream, RecordingError> {
        let channels = config.channels;
        let error_shared = Arc::clone(&shared);
        let on_error = move |err: cpal::StreamError| {
            tracing::error!(error = %err, "audio input stream error");
            error_shared.active.store(false, Ordering::SeqCst);
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    shared.accept(&Self::downmix(data, channels));
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    shared.accept(&Self::downmix(&converted, channels));
                },
                on_error,
                None,
            ),
            other => {
                return Err(RecordingError::Acquisition(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream.map_err(|e| RecordingError::Acquisition(e.to_string()))
    }

    /// Open and start the device stream. Runs on the stream thread.
    fn start_stream(
        constraints: &CaptureConstraints,
        shared: Arc<StreamShared>,
    ) -> Result<(Option<String>, u32, cpal::Stream), RecordingError> {
        let device = Self::find_device(constraints.device_id.as_deref())?;
        let (config, sample_format) = Self::get_input_config(&device, constraints)?;
        let stream = Self::build_stream(&device, &config, sample_format, shared)?;
        stream
            .play()
            .map_err(|e| RecordingError::Acquisition(e.to_string()))?;
        Ok((device.name().ok(), config.sample_rate.0, stream))
    }

}

type OpenResult = Result<(Option<String>, u32), RecordingError>;

#[async_trait]
impl AudioInput for CpalInput {
    async fn resolve_device(&self, preferred: Option<&str>) -> Result<InputDevice, RecordingError> {
        let preferred = preferred.map(str::to_string);
        tokio::task::spawn_blocking(move || {
            let device = Self::find_device(preferred.as_deref())?;
            let label = device.name().ok();
            let id = preferred.filter(|name| label.as_deref() == Some(name.as_str()));
            Ok(InputDevice { id, label })
        })
        .await
        .map_err(|e| RecordingError::Acquisition(format!("Task join error: {}", e)))?
    }

    async fn open_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn InputStream>, RecordingError> {
        if constraints.echo_cancellation
            || constraints.noise_suppression
            || constraints.auto_gain_control
        {
            tracing::debug!("voice processing hints are not available through cpal");
        }

        let constraints = constraints.clone();
        let shared = Arc::new(StreamShared::new());
        let (ready_tx, ready_rx) = oneshot::channel::<OpenResult>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread_shared = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("voice-memo-input".into())
            .spawn(move || {
                match Self::start_stream(&constraints, Arc::clone(&thread_shared)) {
                    Ok((label, sample_rate, stream)) => {
                        let _ = ready_tx.send(Ok((label, sample_rate)));
                        // Blocks until stop_tracks drops or signals the sender
                        let _ = stop_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        thread_shared.active.store(false, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| RecordingError::Acquisition(format!("Failed to spawn input thread: {}", e)))?;

        let (label, sample_rate) = ready_rx
            .await
            .map_err(|_| RecordingError::Acquisition("input thread exited".into()))??;

        tracing::debug!(device = ?label, sample_rate, "input stream opened");

        Ok(Arc::new(CpalStream {
            label,
            sample_rate,
            shared,
            stop_tx: Mutex::new(Some(stop_tx)),
        }))
    }

    fn supports_format(&self, format: &EncodingFormat) -> bool {
        format.base_mime() == WAV_MIME
    }

    fn create_engine(
        &self,
        stream: Arc<dyn InputStream>,
        format: EncodingFormat,
        events: CaptureEventSender,
    ) -> Result<Box<dyn CaptureEngine>, RecordingError> {
        if !self.supports_format(&format) {
            return Err(RecordingError::Acquisition(format!(
                "cpal input cannot encode {}",
                format.mime
            )));
        }
        let stream = stream.into_any().downcast::<CpalStream>().map_err(|_| {
            RecordingError::Acquisition("stream was not opened by a cpal input".into())
        })?;
        Ok(Box::new(CpalCaptureEngine::new(stream, events)))
    }
}

#[derive(Default)]
struct EmitterState {
    header_sent: bool,
    finished: bool,
}

/// Drains a stream's buffer into `Data` events.
///
/// Draining, header bookkeeping and sending happen under one lock, so the
/// timeslice task and `stop` can race without reordering chunks or sending
/// anything after `Stopped`.
struct ChunkEmitter {
    stream: Arc<CpalStream>,
    events: CaptureEventSender,
    state: Mutex<EmitterState>,
}

impl ChunkEmitter {
    fn new(stream: Arc<CpalStream>, events: CaptureEventSender) -> Self {
        Self {
            stream,
            events,
            state: Mutex::new(EmitterState::default()),
        }
    }

    fn flush(&self) {
        let mut state = lock(&self.state);
        if !state.finished {
            self.flush_locked(&mut state);
        }
    }

    /// Final flush followed by `Stopped`. Later calls do nothing.
    fn finish(&self) {
        let mut state = lock(&self.state);
        if state.finished {
            return;
        }
        self.flush_locked(&mut state);
        state.finished = true;
        let _ = self.events.send(CaptureEvent::Stopped);
    }

    /// Error report, unless the engine already finished
    fn fail(&self, message: &str) {
        let mut state = lock(&self.state);
        if state.finished {
            return;
        }
        state.finished = true;
        let _ = self.events.send(CaptureEvent::Error(message.to_string()));
    }

    fn flush_locked(&self, state: &mut EmitterState) {
        let samples = self.stream.shared.take_pending();
        if samples.is_empty() {
            return;
        }

        let mut chunk = Vec::with_capacity(wav::HEADER_LEN + samples.len() * 2);
        if !state.header_sent {
            state.header_sent = true;
            chunk.extend(wav::streaming_header(self.stream.sample_rate, 1));
        }
        chunk.extend(wav::encode_samples(&samples));
        let _ = self.events.send(CaptureEvent::Data(chunk));
    }
}

/// WAV capture engine over a [`CpalStream`]
pub struct CpalCaptureEngine {
    emitter: Arc<ChunkEmitter>,
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl CpalCaptureEngine {
    fn new(stream: Arc<CpalStream>, events: CaptureEventSender) -> Self {
        Self {
            emitter: Arc::new(ChunkEmitter::new(stream, events)),
            task: None,
            stopped: false,
        }
    }

    fn set_capturing(&self, on: bool) {
        self.emitter
            .stream
            .shared
            .capturing
            .store(on, Ordering::SeqCst);
    }
}

impl CaptureEngine for CpalCaptureEngine {
    fn start(&mut self, timeslice: Duration) -> Result<(), RecordingError> {
        if self.task.is_some() || self.stopped {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RecordingError::Acquisition(format!("No async runtime: {}", e)))?;

        self.set_capturing(true);
        let emitter = Arc::clone(&self.emitter);
        self.task = Some(runtime.spawn(async move {
            let mut slices = interval_at(Instant::now() + timeslice, timeslice);
            loop {
                slices.tick().await;
                emitter.flush();
                if !emitter.stream.is_active() {
                    emitter.fail("input stream ended unexpectedly");
                    break;
                }
            }
        }));
        Ok(())
    }

    fn pause(&mut self) {
        self.set_capturing(false);
    }

    fn resume(&mut self) {
        if !self.stopped {
            self.set_capturing(true);
        }
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.set_capturing(false);
        self.emitter.finish();
    }
}

impl Drop for CpalCaptureEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::format;
    use tokio::sync::mpsc;

    fn fake_stream() -> Arc<CpalStream> {
        Arc::new(CpalStream {
            label: Some("test".into()),
            sample_rate: 16_000,
            shared: Arc::new(StreamShared::new()),
            stop_tx: Mutex::new(None),
        })
    }

    #[test]
    fn downmix_single_channel() {
        let mono = vec![100i16, 200, 300];
        assert_eq!(CpalInput::downmix(&mono, 1), mono);
    }

    #[test]
    fn downmix_two_channels() {
        let stereo = vec![100i16, 200, 300, 400];
        assert_eq!(CpalInput::downmix(&stereo, 2), vec![150, 350]);
    }

    #[test]
    fn only_wav_is_supported() {
        let input = CpalInput::new();
        let wav = format::by_mime("audio/wav").unwrap();
        let webm = format::by_mime("audio/webm").unwrap();
        assert!(input.supports_format(&wav));
        assert!(!input.supports_format(&webm));
    }

    #[test]
    fn levels_are_bounded() {
        let stream = fake_stream();
        for _ in 0..(LEVEL_HISTORY + 10) {
            stream.shared.accept(&[i16::MAX / 2]);
        }
        let levels = stream.levels();
        assert_eq!(levels.len(), LEVEL_HISTORY);
        assert!((levels[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn samples_are_dropped_unless_capturing() {
        let stream = fake_stream();
        stream.shared.accept(&[1, 2, 3]);
        assert!(stream.shared.take_pending().is_empty());

        stream.shared.capturing.store(true, Ordering::SeqCst);
        stream.shared.accept(&[1, 2, 3]);
        assert_eq!(stream.shared.take_pending(), vec![1, 2, 3]);
    }

    #[test]
    fn stop_tracks_deactivates() {
        let stream = fake_stream();
        assert!(stream.is_active());
        stream.stop_tracks();
        stream.stop_tracks();
        assert!(!stream.is_active());
    }

    #[tokio::test]
    async fn engine_emits_header_once_then_stopped() {
        let stream = fake_stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = CpalCaptureEngine::new(Arc::clone(&stream), tx);

        engine.start(Duration::from_secs(60)).unwrap();
        stream.shared.accept(&[1, 2]);
        engine.emitter.flush();
        stream.shared.accept(&[3]);
        engine.stop();
        engine.stop();

        let CaptureEvent::Data(first) = rx.recv().await.unwrap() else {
            panic!("expected data");
        };
        assert_eq!(first.len(), wav::HEADER_LEN + 4);
        assert_eq!(&first[0..4], b"RIFF");

        assert_eq!(rx.recv().await.unwrap(), CaptureEvent::Data(vec![3, 0]));
        assert_eq!(rx.recv().await.unwrap(), CaptureEvent::Stopped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn racing_flushes_keep_order_and_end_with_stopped() {
        let stream = fake_stream();
        stream.shared.capturing.store(true, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let emitter = Arc::new(ChunkEmitter::new(Arc::clone(&stream), tx));

        let producer = {
            let stream = Arc::clone(&stream);
            std::thread::spawn(move || {
                for sample in 0..2_000i16 {
                    stream.shared.accept(&[sample]);
                }
            })
        };
        let flushers: Vec<_> = (0..4)
            .map(|_| {
                let emitter = Arc::clone(&emitter);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        emitter.flush();
                    }
                })
            })
            .collect();

        producer.join().unwrap();
        emitter.finish();
        for flusher in flushers {
            flusher.join().unwrap();
        }
        emitter.flush();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.last(), Some(&CaptureEvent::Stopped));
        assert_eq!(
            events.iter().filter(|e| **e == CaptureEvent::Stopped).count(),
            1
        );

        let mut bytes = Vec::new();
        for event in &events[..events.len() - 1] {
            let CaptureEvent::Data(chunk) = event else {
                panic!("unexpected event {:?}", event);
            };
            bytes.extend_from_slice(chunk);
        }
        assert_eq!(&bytes[0..4], b"RIFF");
        let samples: Vec<i16> = bytes[wav::HEADER_LEN..]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(samples, (0..2_000i16).collect::<Vec<_>>());
    }

    #[test]
    fn fail_after_finish_is_silent() {
        let stream = fake_stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let emitter = ChunkEmitter::new(stream, tx);

        emitter.finish();
        emitter.fail("late");

        assert_eq!(rx.try_recv().unwrap(), CaptureEvent::Stopped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn engine_rejects_foreign_stream() {
        struct OtherStream;
        impl InputStream for OtherStream {
            fn is_active(&self) -> bool {
                true
            }
            fn label(&self) -> Option<String> {
                None
            }
            fn levels(&self) -> Vec<f32> {
                Vec::new()
            }
            fn stop_tracks(&self) {}
            fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
                self
            }
        }

        let input = CpalInput::new();
        let wav = format::by_mime("audio/wav").unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(input
            .create_engine(Arc::new(OtherStream), wav, tx.clone())
            .is_err());
        assert!(input.create_engine(fake_stream(), wav, tx).is_ok());
    }

    #[tokio::test]
    async fn paused_engine_drops_samples() {
        let stream = fake_stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = CpalCaptureEngine::new(Arc::clone(&stream), tx);

        engine.start(Duration::from_secs(60)).unwrap();
        engine.pause();
        stream.shared.accept(&[9, 9, 9]);
        engine.stop();

        assert_eq!(rx.recv().await.unwrap(), CaptureEvent::Stopped);
    }

    #[tokio::test]
    #[ignore = "Requires audio hardware"]
    async fn can_open_default_input() {
        let input = CpalInput::new();
        let device = input.resolve_device(None).await.unwrap();
        let constraints = CaptureConstraints::for_platform(
            crate::domain::recording::Platform::current(),
            device.id,
        );
        let stream = input.open_stream(&constraints).await.unwrap();
        assert!(stream.is_active());
        stream.stop_tracks();
    }
}
