//! Recording controller
//!
//! Drives one capture session at a time through
//! idle -> recording <-> paused -> stopped, buffering the chunks the
//! capture engine delivers and materializing an [`AudioBlob`] on pause
//! and stop.
//!
//! State lives behind a single mutex that is never held across an
//! `.await`, so transitions never interleave. Each session registers an
//! event pump task and a 1 Hz ticker; both are aborted on every path out
//! of the state that started them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use super::blob_registry::BlobRegistry;
use super::lock;
use super::ports::{AudioInput, CaptureEngine, CaptureEvent, InputStream, RecordingError};
use crate::domain::audio::AudioBlob;
use crate::domain::recording::format;
use crate::domain::recording::{
    CaptureConstraints, ChunkAssembler, EncodingFormat, Platform, RecordingLifecycle,
    RecordingStatus,
};

/// Interval between capture data deliveries
pub const DEFAULT_TIMESLICE: Duration = Duration::from_millis(200);

/// Extra acquisition attempts after the first failure
pub const MAX_RETRIES: u32 = 2;

/// Fixed delay between acquisition attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// How long `stop_recording` waits for the engine to finalize
pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

/// Label reported when the device has no name
pub const DEFAULT_DEVICE_LABEL: &str = "Default microphone";

const TICK: Duration = Duration::from_secs(1);

/// Tunables for the recording controller
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Input device name to prefer over the platform default
    pub preferred_device: Option<String>,
    pub timeslice: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub finalize_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            preferred_device: None,
            timeslice: DEFAULT_TIMESLICE,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            finalize_timeout: FINALIZE_TIMEOUT,
        }
    }
}

/// Point-in-time copy of everything the controller exposes
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingView {
    pub status: RecordingStatus,
    pub elapsed_seconds: u64,
    pub assembled_audio: Option<AudioBlob>,
    pub object_url: Option<String>,
    pub device_label: String,
    pub format: Option<EncodingFormat>,
    pub last_error: Option<RecordingError>,
}

type FinalizeResult = Result<(), RecordingError>;

/// Live capture resources. Present iff status is recording or paused.
struct Session {
    id: u64,
    stream: Arc<dyn InputStream>,
    engine: Box<dyn CaptureEngine>,
    format: EncodingFormat,
    pump: JoinHandle<()>,
    finalize_tx: Option<oneshot::Sender<FinalizeResult>>,
}

impl Session {
    /// Unregister the event pump, stop the engine and release the hardware
    fn release(mut self) {
        self.pump.abort();
        self.engine.stop();
        self.stream.stop_tracks();
    }
}

struct ControllerState {
    lifecycle: RecordingLifecycle,
    elapsed_seconds: u64,
    assembler: ChunkAssembler,
    assembled: Option<AudioBlob>,
    object_url: Option<String>,
    session: Option<Session>,
    ticker: Option<JoinHandle<()>>,
    device_label: String,
    format: Option<EncodingFormat>,
    last_error: Option<RecordingError>,
    /// Bumped by every start and reset; in-flight attempts compare against it
    attempt: u64,
    next_session_id: u64,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            lifecycle: RecordingLifecycle::new(),
            elapsed_seconds: 0,
            assembler: ChunkAssembler::new(),
            assembled: None,
            object_url: None,
            session: None,
            ticker: None,
            device_label: DEFAULT_DEVICE_LABEL.to_string(),
            format: None,
            last_error: None,
            attempt: 0,
            next_session_id: 0,
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn set_assembled(&mut self, blob: AudioBlob, blobs: &BlobRegistry) {
        if let Some(url) = self.object_url.take() {
            blobs.revoke(&url);
        }
        self.object_url = Some(blobs.create_url(blob.clone()));
        self.assembled = Some(blob);
    }

    /// Tear everything down and return to idle defaults. Safe from any state.
    fn full_reset(&mut self, blobs: &BlobRegistry) {
        self.stop_ticker();
        if let Some(session) = self.session.take() {
            tracing::debug!(session = session.id, "releasing capture session");
            session.release();
        }
        if let Some(url) = self.object_url.take() {
            blobs.revoke(&url);
        }
        self.assembler.clear();
        self.assembled = None;
        self.elapsed_seconds = 0;
        self.lifecycle.reset();
        self.device_label = DEFAULT_DEVICE_LABEL.to_string();
        self.format = None;
        self.last_error = None;
    }

    fn view(&self) -> RecordingView {
        RecordingView {
            status: self.lifecycle.status(),
            elapsed_seconds: self.elapsed_seconds,
            assembled_audio: self.assembled.clone(),
            object_url: self.object_url.clone(),
            device_label: self.device_label.clone(),
            format: self.format,
            last_error: self.last_error.clone(),
        }
    }
}

/// Microphone recording controller
pub struct RecordingController {
    input: Arc<dyn AudioInput>,
    blobs: Arc<BlobRegistry>,
    config: RecorderConfig,
    state: Arc<Mutex<ControllerState>>,
}

impl RecordingController {
    /// Create a controller over `input`, registering clips in `blobs`
    pub fn new(input: Arc<dyn AudioInput>, blobs: Arc<BlobRegistry>, config: RecorderConfig) -> Self {
        Self {
            input,
            blobs,
            config,
            state: Arc::new(Mutex::new(ControllerState::new())),
        }
    }

    pub fn status(&self) -> RecordingStatus {
        lock(&self.state).lifecycle.status()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        lock(&self.state).elapsed_seconds
    }

    /// Clip assembled by the last pause or stop
    pub fn assembled_audio(&self) -> Option<AudioBlob> {
        lock(&self.state).assembled.clone()
    }

    /// `blob:` URL for the assembled clip, revoked on reset
    pub fn object_url(&self) -> Option<String> {
        lock(&self.state).object_url.clone()
    }

    /// The live stream, for waveform consumers. `None` unless recording or paused.
    pub fn live_stream(&self) -> Option<Arc<dyn InputStream>> {
        lock(&self.state)
            .session
            .as_ref()
            .map(|session| Arc::clone(&session.stream))
    }

    pub fn device_label(&self) -> String {
        lock(&self.state).device_label.clone()
    }

    /// Encoding chosen for the current or last session
    pub fn format(&self) -> Option<EncodingFormat> {
        lock(&self.state).format
    }

    pub fn last_error(&self) -> Option<RecordingError> {
        lock(&self.state).last_error.clone()
    }

    pub fn view(&self) -> RecordingView {
        lock(&self.state).view()
    }

    /// Acquire the input and start capturing.
    ///
    /// Any active session is torn down first. Acquisition is retried
    /// `max_retries` times with a fixed delay; when every attempt fails the
    /// controller resets to idle and records the error in `last_error`.
    pub async fn start_recording(&self) -> Result<(), RecordingError> {
        let attempt = {
            let mut state = lock(&self.state);
            if state.session.is_some() {
                tracing::debug!("start requested during an active session; releasing it");
            }
            state.full_reset(&self.blobs);
            state.attempt += 1;
            state.attempt
        };

        let mut last_error = None;
        for try_index in 0..=self.config.max_retries {
            if try_index > 0 {
                tracing::warn!(
                    retry = try_index,
                    delay_ms = self.config.retry_delay.as_millis() as u64,
                    "retrying audio acquisition"
                );
                tokio::time::sleep(self.config.retry_delay).await;
                if !self.is_current(attempt) {
                    return Err(RecordingError::Superseded);
                }
            }

            match self.try_acquire(attempt).await {
                Ok(()) => return Ok(()),
                Err(RecordingError::Superseded) => return Err(RecordingError::Superseded),
                Err(e) => {
                    tracing::warn!(error = %e, "audio acquisition failed");
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| RecordingError::Acquisition("no acquisition attempt ran".into()));

        let mut state = lock(&self.state);
        if state.attempt != attempt {
            return Err(RecordingError::Superseded);
        }
        state.full_reset(&self.blobs);
        state.last_error = Some(error.clone());
        tracing::error!(error = %error, "recording failed");
        Err(error)
    }

    fn is_current(&self, attempt: u64) -> bool {
        lock(&self.state).attempt == attempt
    }

    /// One acquisition attempt. Anything acquired is released on failure.
    async fn try_acquire(&self, attempt: u64) -> Result<(), RecordingError> {
        let device = self
            .input
            .resolve_device(self.config.preferred_device.as_deref())
            .await?;
        let constraints = CaptureConstraints::for_platform(Platform::current(), device.id.clone());
        let stream = self.input.open_stream(&constraints).await?;

        if !self.is_current(attempt) {
            stream.stop_tracks();
            return Err(RecordingError::Superseded);
        }
        if !stream.is_active() {
            stream.stop_tracks();
            return Err(RecordingError::Acquisition(
                "input stream is not active".to_string(),
            ));
        }

        let format = match format::select_supported(|f| self.input.supports_format(f)) {
            Ok(format) => format,
            Err(e) => {
                stream.stop_tracks();
                return Err(e.into());
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut engine = match self
            .input
            .create_engine(Arc::clone(&stream), format, events_tx)
        {
            Ok(engine) => engine,
            Err(e) => {
                stream.stop_tracks();
                return Err(e);
            }
        };

        let mut state = lock(&self.state);
        if state.attempt != attempt {
            engine.stop();
            stream.stop_tracks();
            return Err(RecordingError::Superseded);
        }
        if let Err(e) = state.lifecycle.start() {
            engine.stop();
            stream.stop_tracks();
            return Err(e.into());
        }
        if let Err(e) = engine.start(self.config.timeslice) {
            state.lifecycle.reset();
            engine.stop();
            stream.stop_tracks();
            return Err(e);
        }

        state.next_session_id += 1;
        let session_id = state.next_session_id;
        let pump = tokio::spawn(pump_events(
            Arc::clone(&self.state),
            Arc::clone(&self.blobs),
            session_id,
            events_rx,
        ));

        state.device_label = stream
            .label()
            .or(device.label)
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| DEFAULT_DEVICE_LABEL.to_string());
        state.session = Some(Session {
            id: session_id,
            stream,
            engine,
            format,
            pump,
            finalize_tx: None,
        });
        state.elapsed_seconds = 0;
        state.format = Some(format);
        state.last_error = None;
        state.ticker = Some(spawn_ticker(Arc::clone(&self.state), session_id));

        tracing::info!(
            session = session_id,
            device = %state.device_label,
            format = format.mime,
            "recording started"
        );
        Ok(())
    }

    /// Pause when recording, resume when paused, otherwise do nothing.
    ///
    /// Pausing assembles the chunks received so far into `assembled_audio`
    /// without ending the session.
    pub fn toggle_pause_resume(&self) -> Result<RecordingStatus, RecordingError> {
        let mut state = lock(&self.state);
        let state = &mut *state;

        let Some(session) = state.session.as_mut() else {
            return Ok(state.lifecycle.status());
        };
        let session_id = session.id;
        let mime = session.format.mime;

        match state.lifecycle.status() {
            RecordingStatus::Recording => {
                state.lifecycle.pause()?;
                session.engine.pause();
                state.stop_ticker();
                if let Some(blob) = state.assembler.assemble(mime) {
                    state.set_assembled(blob, &self.blobs);
                }
                tracing::debug!(session = session_id, "recording paused");
            }
            RecordingStatus::Paused => {
                state.lifecycle.resume()?;
                session.engine.resume();
                state.ticker = Some(spawn_ticker(Arc::clone(&self.state), session_id));
                tracing::debug!(session = session_id, "recording resumed");
            }
            _ => {}
        }

        Ok(state.lifecycle.status())
    }

    /// Finalize the session and return the clip.
    ///
    /// Fails with `NoData` (and resets to idle) if nothing was captured.
    pub async fn stop_recording(&self) -> Result<AudioBlob, RecordingError> {
        let (finalized, session_id) = {
            let mut state = lock(&self.state);
            let state = &mut *state;
            let Some(session) = state.session.as_mut() else {
                return Err(RecordingError::NotActive);
            };
            let (tx, rx) = oneshot::channel();
            session.finalize_tx = Some(tx);
            session.engine.stop();
            let id = session.id;
            state.stop_ticker();
            (rx, id)
        };

        match tokio::time::timeout(self.config.finalize_timeout, finalized).await {
            Ok(Ok(outcome)) => outcome?,
            // Sender dropped: the session was released underneath us
            Ok(Err(_)) => return Err(RecordingError::Superseded),
            Err(_) => {
                tracing::warn!(session = session_id, "capture engine did not finalize in time");
            }
        }

        let mut state = lock(&self.state);
        let current = state.session.as_ref().map(|s| (s.id, s.format.mime));
        let Some((id, mime)) = current else {
            return Err(RecordingError::Superseded);
        };
        if id != session_id {
            return Err(RecordingError::Superseded);
        }

        let assembled = if state.assembler.has_received_data() {
            state.assembler.assemble(mime)
        } else {
            None
        };
        let Some(blob) = assembled else {
            state.full_reset(&self.blobs);
            state.last_error = Some(RecordingError::NoData);
            tracing::warn!(session = session_id, "recording produced no data");
            return Err(RecordingError::NoData);
        };

        if let Some(session) = state.session.take() {
            session.release();
        }
        state.lifecycle.stop()?;
        state.set_assembled(blob.clone(), &self.blobs);
        state.last_error = None;

        tracing::info!(
            session = session_id,
            size = %blob.human_readable_size(),
            elapsed_seconds = state.elapsed_seconds,
            "recording stopped"
        );
        Ok(blob)
    }

    /// Full reset: stop any session, release the hardware, revoke the
    /// object URL and clear every field. Safe to call from any state.
    pub fn release_resources(&self) {
        let mut state = lock(&self.state);
        state.attempt += 1;
        state.full_reset(&self.blobs);
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.release_resources();
    }
}

/// Count elapsed seconds while the session is recording
fn spawn_ticker(state: Arc<Mutex<ControllerState>>, session_id: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        loop {
            ticker.tick().await;
            let still_recording = {
                let mut state = lock(&state);
                let current = state.session.as_ref().map(|s| s.id) == Some(session_id)
                    && state.lifecycle.status() == RecordingStatus::Recording;
                if current {
                    state.elapsed_seconds += 1;
                }
                current
            };
            if !still_recording {
                break;
            }
        }
    })
}

/// Apply a session's capture events in delivery order until it finishes
async fn pump_events(
    state: Arc<Mutex<ControllerState>>,
    blobs: Arc<BlobRegistry>,
    session_id: u64,
    mut events: mpsc::UnboundedReceiver<CaptureEvent>,
) {
    while let Some(event) = events.recv().await {
        let done = apply_event(&mut lock(&state), &blobs, session_id, event);
        if done {
            break;
        }
    }
}

/// Returns `true` once the session will deliver nothing more
fn apply_event(
    state: &mut ControllerState,
    blobs: &BlobRegistry,
    session_id: u64,
    event: CaptureEvent,
) -> bool {
    let Some(session) = state.session.as_mut().filter(|s| s.id == session_id) else {
        tracing::debug!(session = session_id, "dropping event for a released session");
        return true;
    };

    match event {
        CaptureEvent::Data(bytes) => {
            let len = bytes.len();
            if state.assembler.push(bytes) {
                tracing::trace!(session = session_id, bytes = len, "chunk received");
            }
            false
        }
        CaptureEvent::Stopped => {
            if let Some(tx) = session.finalize_tx.take() {
                let _ = tx.send(Ok(()));
            }
            true
        }
        CaptureEvent::Error(message) => {
            tracing::error!(session = session_id, error = %message, "capture engine failed");
            let waiter = session.finalize_tx.take();
            let error = RecordingError::Acquisition(message);
            state.full_reset(blobs);
            state.last_error = Some(error.clone());
            if let Some(tx) = waiter {
                let _ = tx.send(Err(error));
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CaptureEventSender, InputDevice};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FakeStream {
        label: String,
        active: bool,
        stopped: AtomicBool,
    }

    impl InputStream for FakeStream {
        fn is_active(&self) -> bool {
            self.active && !self.stopped.load(Ordering::SeqCst)
        }

        fn label(&self) -> Option<String> {
            Some(self.label.clone())
        }

        fn levels(&self) -> Vec<f32> {
            vec![0.5]
        }

        fn stop_tracks(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
            self
        }
    }

    struct FakeEngine {
        events: CaptureEventSender,
        calls: Arc<Mutex<Vec<String>>>,
        stopped: bool,
    }

    impl CaptureEngine for FakeEngine {
        fn start(&mut self, timeslice: Duration) -> Result<(), RecordingError> {
            lock(&self.calls).push(format!("start:{}", timeslice.as_millis()));
            Ok(())
        }

        fn pause(&mut self) {
            lock(&self.calls).push("pause".into());
        }

        fn resume(&mut self) {
            lock(&self.calls).push("resume".into());
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                lock(&self.calls).push("stop".into());
                let _ = self.events.send(CaptureEvent::Stopped);
            }
        }
    }

    #[derive(Default)]
    struct FakeInput {
        supported: Vec<&'static str>,
        failing_opens: AtomicU32,
        inactive: bool,
        open_delays: Mutex<Vec<Duration>>,
        opens: AtomicU32,
        streams: Mutex<Vec<Arc<FakeStream>>>,
        senders: Mutex<Vec<CaptureEventSender>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeInput {
        fn wav_only() -> Self {
            Self {
                supported: vec!["audio/wav"],
                ..Default::default()
            }
        }

        fn emit(&self, event: CaptureEvent) {
            let senders = lock(&self.senders);
            let _ = senders.last().expect("no engine created").send(event);
        }

        fn stream(&self, index: usize) -> Arc<FakeStream> {
            Arc::clone(&lock(&self.streams)[index])
        }

        fn opens(&self) -> u32 {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AudioInput for FakeInput {
        async fn resolve_device(
            &self,
            preferred: Option<&str>,
        ) -> Result<InputDevice, RecordingError> {
            Ok(InputDevice {
                id: preferred.map(str::to_string),
                label: None,
            })
        }

        async fn open_stream(
            &self,
            _constraints: &CaptureConstraints,
        ) -> Result<Arc<dyn InputStream>, RecordingError> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = {
                let mut delays = lock(&self.open_delays);
                if delays.is_empty() {
                    Duration::ZERO
                } else {
                    delays.remove(0)
                }
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.failing_opens.load(Ordering::SeqCst) >= n {
                return Err(RecordingError::Acquisition("device busy".into()));
            }
            let stream = Arc::new(FakeStream {
                label: format!("mic-{}", n),
                active: !self.inactive,
                stopped: AtomicBool::new(false),
            });
            lock(&self.streams).push(Arc::clone(&stream));
            Ok(stream)
        }

        fn supports_format(&self, format: &EncodingFormat) -> bool {
            self.supported.contains(&format.mime)
        }

        fn create_engine(
            &self,
            _stream: Arc<dyn InputStream>,
            _format: EncodingFormat,
            events: CaptureEventSender,
        ) -> Result<Box<dyn CaptureEngine>, RecordingError> {
            lock(&self.senders).push(events.clone());
            Ok(Box::new(FakeEngine {
                events,
                calls: Arc::clone(&self.calls),
                stopped: false,
            }))
        }
    }

    fn controller(input: FakeInput) -> (Arc<FakeInput>, RecordingController, Arc<BlobRegistry>) {
        let input = Arc::new(input);
        let blobs = Arc::new(BlobRegistry::new());
        let controller = RecordingController::new(
            Arc::clone(&input) as Arc<dyn AudioInput>,
            Arc::clone(&blobs),
            RecorderConfig::default(),
        );
        (input, controller, blobs)
    }

    /// Let spawned tasks drain their queues
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_transitions_to_recording() {
        let (input, controller, _) = controller(FakeInput::wav_only());

        controller.start_recording().await.unwrap();

        assert_eq!(controller.status(), RecordingStatus::Recording);
        assert_eq!(controller.device_label(), "mic-1");
        assert_eq!(controller.format().unwrap().mime, "audio/wav");
        assert!(controller.live_stream().is_some());
        assert_eq!(lock(&input.calls).first().unwrap(), "start:200");
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_three_chunks_then_stop() {
        let (input, controller, blobs) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();

        for size in [10, 20, 30] {
            input.emit(CaptureEvent::Data(vec![1u8; size]));
        }
        let blob = controller.stop_recording().await.unwrap();

        assert_eq!(blob.size_bytes(), 60);
        assert_eq!(controller.status(), RecordingStatus::Stopped);
        assert!(controller.live_stream().is_none());
        assert!(input.stream(0).stopped.load(Ordering::SeqCst));
        let url = controller.object_url().unwrap();
        assert_eq!(blobs.resolve(&url).unwrap().size_bytes(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_resume_stop_conserves_bytes_in_order() {
        let (input, controller, _) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();

        input.emit(CaptureEvent::Data(vec![1, 2]));
        input.emit(CaptureEvent::Data(Vec::new()));
        settle().await;
        assert_eq!(controller.toggle_pause_resume().unwrap(), RecordingStatus::Paused);
        assert_eq!(controller.assembled_audio().unwrap().data(), &[1, 2]);

        assert_eq!(controller.toggle_pause_resume().unwrap(), RecordingStatus::Recording);
        input.emit(CaptureEvent::Data(vec![3]));
        input.emit(CaptureEvent::Data(vec![4, 5, 6]));

        let blob = controller.stop_recording().await.unwrap();
        assert_eq!(blob.data(), &[1, 2, 3, 4, 5, 6]);
        let calls = lock(&input.calls).clone();
        assert_eq!(calls, vec!["start:200", "pause", "resume", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_revokes_previous_object_url() {
        let (input, controller, blobs) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();
        input.emit(CaptureEvent::Data(vec![1]));
        settle().await;
        controller.toggle_pause_resume().unwrap();
        let first = controller.object_url().unwrap();

        controller.toggle_pause_resume().unwrap();
        input.emit(CaptureEvent::Data(vec![2]));
        settle().await;
        controller.toggle_pause_resume().unwrap();
        let second = controller.object_url().unwrap();

        assert_ne!(first, second);
        assert!(blobs.resolve(&first).is_none());
        assert_eq!(blobs.resolve(&second).unwrap().size_bytes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_data_fails_and_resets() {
        let (input, controller, _) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();
        input.emit(CaptureEvent::Data(Vec::new()));

        let err = controller.stop_recording().await.unwrap_err();

        assert_eq!(err, RecordingError::NoData);
        assert_eq!(controller.status(), RecordingStatus::Idle);
        assert_eq!(controller.last_error(), Some(RecordingError::NoData));
        assert!(controller.assembled_audio().is_none());
        assert!(input.stream(0).stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_is_rejected() {
        let (_, controller, _) = controller(FakeInput::wav_only());
        assert_eq!(
            controller.stop_recording().await.unwrap_err(),
            RecordingError::NotActive
        );
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_when_idle_is_noop() {
        let (_, controller, _) = controller(FakeInput::wav_only());
        assert_eq!(controller.toggle_pause_resume().unwrap(), RecordingStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_counts_only_while_recording() {
        let (_, controller, _) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(controller.elapsed_seconds(), 3);

        controller.toggle_pause_resume().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.elapsed_seconds(), 3);

        controller.toggle_pause_resume().unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(controller.elapsed_seconds(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let input = FakeInput::wav_only();
        input.failing_opens.store(2, Ordering::SeqCst);
        let (input, controller, _) = controller(input);

        let started = Instant::now();
        controller.start_recording().await.unwrap();

        assert_eq!(input.opens(), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(controller.status(), RecordingStatus::Recording);
        assert!(controller.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_reset_to_idle_with_error() {
        let input = FakeInput::wav_only();
        input.failing_opens.store(u32::MAX, Ordering::SeqCst);
        let (input, controller, _) = controller(input);

        let err = controller.start_recording().await.unwrap_err();

        assert!(matches!(err, RecordingError::Acquisition(_)));
        assert_eq!(input.opens(), 3);
        assert_eq!(controller.status(), RecordingStatus::Idle);
        assert_eq!(controller.last_error(), Some(err));
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_no_supported_format() {
        let (input, controller, _) = controller(FakeInput::default());

        let err = controller.start_recording().await.unwrap_err();

        assert!(matches!(err, RecordingError::UnsupportedFormat(_)));
        assert_eq!(input.opens(), 3);
        assert_eq!(controller.status(), RecordingStatus::Idle);
        for i in 0..3 {
            assert!(input.stream(i).stopped.load(Ordering::SeqCst));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_stream_is_an_acquisition_error() {
        let input = FakeInput {
            inactive: true,
            ..FakeInput::wav_only()
        };
        let (_, controller, _) = controller(input);

        let err = controller.start_recording().await.unwrap_err();
        assert!(matches!(err, RecordingError::Acquisition(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn engine_error_resets_to_idle() {
        let (input, controller, _) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();

        input.emit(CaptureEvent::Error("device unplugged".into()));
        settle().await;

        assert_eq!(controller.status(), RecordingStatus::Idle);
        assert_eq!(
            controller.last_error(),
            Some(RecordingError::Acquisition("device unplugged".into()))
        );
        assert!(input.stream(0).stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_again_releases_previous_session() {
        let (input, controller, _) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();
        controller.start_recording().await.unwrap();

        assert!(input.stream(0).stopped.load(Ordering::SeqCst));
        assert!(!input.stream(1).stopped.load(Ordering::SeqCst));
        assert_eq!(controller.device_label(), "mic-2");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_acquisition_does_not_clobber_newer_session() {
        let input = FakeInput::wav_only();
        *lock(&input.open_delays) = vec![Duration::from_secs(2)];
        let (input, controller, _) = controller(input);
        let controller = Arc::new(controller);

        let slow = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.start_recording().await })
        };
        settle().await;
        controller.start_recording().await.unwrap();

        let stale = slow.await.unwrap();
        assert_eq!(stale.unwrap_err(), RecordingError::Superseded);
        assert_eq!(controller.status(), RecordingStatus::Recording);
        assert_eq!(controller.device_label(), "mic-2");
        // The slow attempt opened the first stream last and must release it
        assert!(input.stream(1).stopped.load(Ordering::SeqCst));
        assert!(!input.stream(0).stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_idempotent_from_any_state() {
        let (input, controller, blobs) = controller(FakeInput::wav_only());
        controller.release_resources();
        let idle = controller.view();

        controller.start_recording().await.unwrap();
        input.emit(CaptureEvent::Data(vec![1, 2, 3]));
        settle().await;
        controller.toggle_pause_resume().unwrap();
        assert_eq!(blobs.len(), 1);

        controller.release_resources();
        let first = controller.view();
        controller.release_resources();
        let second = controller.view();

        assert_eq!(first, second);
        assert_eq!(first, idle);
        assert_eq!(first.device_label, DEFAULT_DEVICE_LABEL);
        assert!(blobs.is_empty());
        assert!(input.stream(0).stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn release_stops_ticker() {
        let (_, controller, _) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        controller.release_resources();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(controller.elapsed_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_controller_releases_hardware() {
        let (input, controller, _) = controller(FakeInput::wav_only());
        controller.start_recording().await.unwrap();
        drop(controller);
        assert!(input.stream(0).stopped.load(Ordering::SeqCst));
    }
}
