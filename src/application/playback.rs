//! Playback engine
//!
//! Loads a clip by locator, decodes it on the blocking pool, and plays it
//! through one-shot nodes on a decode context. Position is derived from the
//! context clock (see [`PlaybackClock`]) and published to subscribers once
//! per frame while playing.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::blob_registry::BlobRegistry;
use super::lock;
use super::ports::{AudioOutput, DecodeContext, PlaybackError, PlaybackNode, SourceFetcher};
use super::subscription::{SnapshotBus, Subscription};
use crate::domain::audio::DecodedAudio;
use crate::domain::playback::{
    clamp_time, PlaybackClock, PlaybackSnapshot, SourceLocator, END_TOLERANCE_SECS,
};
use crate::infrastructure::fetch::UrlFetcher;
use crate::infrastructure::playback::RodioOutput;

/// Position publish interval while playing
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Default)]
struct EngineState {
    context: Option<Box<dyn DecodeContext>>,
    buffer: Option<Arc<DecodedAudio>>,
    clock: PlaybackClock,
    is_ready: bool,
    is_playing: bool,
    node: Option<Box<dyn PlaybackNode>>,
    tracking: Option<JoinHandle<()>>,
    ended_waiter: Option<JoinHandle<()>>,
    load_generation: u64,
    node_generation: u64,
}

impl EngineState {
    fn duration(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    fn now(&self) -> f64 {
        self.context.as_ref().map(|ctx| ctx.now()).unwrap_or(0.0)
    }

    fn current_time(&self) -> f64 {
        let duration = self.duration();
        if self.clock.is_running() {
            self.clock.current(self.now(), duration)
        } else {
            clamp_time(self.clock.offset(), duration)
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: self.is_playing,
            is_ready: self.is_ready,
            current_time: self.current_time(),
            duration: self.duration(),
        }
    }

    /// Explicit stop. The node's ended signal is discarded.
    fn stop_node(&mut self) {
        if let Some(waiter) = self.ended_waiter.take() {
            waiter.abort();
        }
        if let Some(mut node) = self.node.take() {
            node.stop();
        }
        self.node_generation += 1;
    }

    fn stop_tracking(&mut self) {
        if let Some(tracking) = self.tracking.take() {
            tracking.abort();
        }
    }

    /// Drop the loaded clip and close the context
    fn unload(&mut self) {
        self.stop_node();
        self.stop_tracking();
        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.buffer = None;
        self.clock.reset();
        self.is_ready = false;
        self.is_playing = false;
    }
}

struct Shared {
    state: Mutex<EngineState>,
    bus: SnapshotBus<PlaybackSnapshot>,
}

impl Shared {
    /// Compute under the state lock, notify outside it
    fn publish(&self) -> Arc<PlaybackSnapshot> {
        let snapshot = lock(&self.state).snapshot();
        self.bus.publish(snapshot)
    }

    /// Start a node at the stored offset. Caller holds the lock and has
    /// checked readiness.
    fn start_locked(self: &Arc<Self>, state: &mut EngineState) -> Result<(), PlaybackError> {
        let buffer = state
            .buffer
            .clone()
            .ok_or_else(|| PlaybackError::Playback("no audio loaded".to_string()))?;
        let context = state
            .context
            .as_mut()
            .ok_or_else(|| PlaybackError::Playback("no audio context".to_string()))?;

        if context.is_suspended() {
            context.resume()?;
        }

        let offset = clamp_time(state.clock.offset(), buffer.duration());
        let (ended_tx, ended_rx) = oneshot::channel();
        let node = context.start_node(buffer, offset, ended_tx)?;
        let started_at = context.now();

        state.node_generation += 1;
        let generation = state.node_generation;
        state.node = Some(node);
        state.clock.start(started_at);
        state.is_playing = true;
        state.ended_waiter = Some(self.spawn_ended_waiter(generation, ended_rx));
        if state.tracking.is_none() {
            state.tracking = Some(self.spawn_tracking());
        }

        tracing::debug!(offset, generation, "playback node started");
        Ok(())
    }

    fn spawn_ended_waiter(
        self: &Arc<Self>,
        generation: u64,
        ended: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            // A dropped sender means the node was stopped, not finished
            if ended.await.is_ok() {
                shared.handle_ended(generation);
            }
        })
    }

    /// Natural end of the current node. A node can drain before the
    /// context clock reaches the end (the device buffer is still playing);
    /// the end is then deferred until the clock is within tolerance.
    fn handle_ended(self: &Arc<Self>, generation: u64) {
        {
            let mut state = lock(&self.state);
            if generation != state.node_generation || !state.is_playing {
                return;
            }
            let duration = state.duration();
            let current = state.clock.current(state.now(), duration);
            let remaining = duration - END_TOLERANCE_SECS - current;
            if remaining > 0.0 {
                tracing::debug!(current, duration, "node drained ahead of the clock; deferring end");
                let delay = Duration::from_secs_f64(remaining).max(FRAME_INTERVAL);
                state.ended_waiter = Some(self.spawn_deferred_end(generation, delay));
                return;
            }

            state.node = None;
            state.ended_waiter = None;
            state.stop_tracking();
            state.clock.reset();
            state.is_playing = false;
            if let Some(context) = state.context.as_mut() {
                context.suspend();
            }
            tracing::debug!(duration, "playback reached the end");
        }
        self.publish();
    }

    fn spawn_deferred_end(self: &Arc<Self>, generation: u64, delay: Duration) -> JoinHandle<()> {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.handle_ended(generation);
        })
    }

    fn spawn_tracking(self: &Arc<Self>) -> JoinHandle<()> {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let mut frames = tokio::time::interval(FRAME_INTERVAL);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                frames.tick().await;
                let snapshot = {
                    let state = lock(&shared.state);
                    if !state.is_playing {
                        break;
                    }
                    state.snapshot()
                };
                shared.bus.publish(snapshot);
            }
        })
    }
}

/// Single-clip audio player with observable state
pub struct PlaybackEngine {
    output: Arc<dyn AudioOutput>,
    fetcher: Arc<dyn SourceFetcher>,
    shared: Arc<Shared>,
}

impl PlaybackEngine {
    pub fn new(output: Arc<dyn AudioOutput>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            output,
            fetcher,
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState::default()),
                bus: SnapshotBus::new(PlaybackSnapshot::default()),
            }),
        }
    }

    /// Process-wide engine on the default output device
    pub fn global() -> Arc<PlaybackEngine> {
        static GLOBAL: OnceLock<Arc<PlaybackEngine>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            Arc::new(PlaybackEngine::new(
                Arc::new(RodioOutput::new()),
                Arc::new(UrlFetcher::new(BlobRegistry::global())),
            ))
        }))
    }

    /// Current state. The same `Arc` is returned until a field changes.
    pub fn snapshot(&self) -> Arc<PlaybackSnapshot> {
        let snapshot = lock(&self.shared.state).snapshot();
        self.shared.bus.store(snapshot)
    }

    /// Register `callback` for state changes
    #[must_use = "dropping the Subscription unregisters the callback"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(callback)
    }

    /// Load `locator`, replacing whatever was loaded.
    ///
    /// Only the most recent call takes effect; earlier in-flight loads
    /// return `Superseded` and leave state untouched.
    pub async fn load_audio(&self, locator: impl Into<SourceLocator>) -> Result<(), PlaybackError> {
        let locator = locator.into();
        let generation = {
            let mut state = lock(&self.shared.state);
            state.unload();
            state.load_generation += 1;
            state.load_generation
        };
        self.shared.publish();
        tracing::debug!(%locator, generation, "loading audio");

        let loaded = self.fetch_and_decode(&locator).await;

        let result = {
            let mut state = lock(&self.shared.state);
            if state.load_generation != generation {
                if let Ok((mut context, _)) = loaded {
                    context.close();
                }
                tracing::debug!(%locator, "discarding superseded load");
                return Err(PlaybackError::Superseded);
            }

            match loaded {
                Ok((context, buffer)) => {
                    tracing::info!(
                        %locator,
                        duration = buffer.duration(),
                        channels = buffer.channels(),
                        sample_rate = buffer.sample_rate(),
                        "audio loaded"
                    );
                    state.context = Some(context);
                    state.buffer = Some(Arc::new(buffer));
                    state.clock.reset();
                    state.is_ready = true;
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(%locator, error = %e, "failed to load audio");
                    state.buffer = None;
                    state.clock.reset();
                    state.is_ready = false;
                    Err(e)
                }
            }
        };

        self.shared.publish();
        result
    }

    async fn fetch_and_decode(
        &self,
        locator: &SourceLocator,
    ) -> Result<(Box<dyn DecodeContext>, DecodedAudio), PlaybackError> {
        let bytes = self.fetcher.fetch(locator).await?;
        let context = self.output.open_context()?;

        let (mut context, decoded) =
            tokio::task::spawn_blocking(move || {
                let decoded = context.decode(&bytes);
                (context, decoded)
            })
            .await
            .map_err(|e| PlaybackError::Load(format!("decode task failed: {}", e)))?;

        match decoded {
            Ok(buffer) => Ok((context, buffer)),
            Err(e) => {
                context.close();
                Err(e)
            }
        }
    }

    /// Start playing from the current position. No-op when already playing
    /// or nothing is loaded.
    pub fn play(&self) -> Result<(), PlaybackError> {
        let result = {
            let mut state = lock(&self.shared.state);
            if state.is_playing || !state.is_ready {
                return Ok(());
            }
            let started = self.shared.start_locked(&mut state);
            if let Err(e) = &started {
                tracing::warn!(error = %e, "failed to start playback");
                state.stop_node();
                state.stop_tracking();
                state.is_playing = false;
                state.is_ready = false;
            }
            started
        };
        self.shared.publish();
        result
    }

    /// Pause, keeping the current position. No-op when not playing.
    pub fn pause(&self) {
        {
            let mut state = lock(&self.shared.state);
            if !state.is_playing {
                return;
            }
            let now = state.now();
            let duration = state.duration();
            state.stop_node();
            state.clock.freeze(now, duration);
            if let Some(context) = state.context.as_mut() {
                context.suspend();
            }
            state.stop_tracking();
            state.is_playing = false;
        }
        self.shared.publish();
    }

    /// Move to `time` seconds, clamped to the clip. Keeps playing if it was.
    pub fn seek(&self, time: f64) -> Result<(), PlaybackError> {
        let result = {
            let mut state = lock(&self.shared.state);
            if state.buffer.is_none() {
                return Ok(());
            }
            let duration = state.duration();
            if state.is_playing {
                state.stop_node();
                state.clock.seek(time, duration);
                let restarted = self.shared.start_locked(&mut state);
                if restarted.is_err() {
                    state.stop_tracking();
                    state.is_playing = false;
                    state.is_ready = false;
                }
                restarted
            } else {
                state.clock.seek(time, duration);
                Ok(())
            }
        };
        self.shared.publish();
        result
    }

    /// Play if paused, pause if playing
    pub fn toggle(&self) -> Result<(), PlaybackError> {
        let playing = lock(&self.shared.state).is_playing;
        if playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Release the context and clip. Idempotent. In-flight loads are
    /// superseded.
    pub fn dispose(&self) {
        {
            let mut state = lock(&self.shared.state);
            state.unload();
            state.load_generation += 1;
        }
        self.shared.publish();
    }

    /// Static waveform of the loaded clip, empty when nothing is loaded
    pub fn waveform(&self, bars: usize) -> Vec<f32> {
        lock(&self.shared.state)
            .buffer
            .as_ref()
            .map(|buffer| buffer.waveform(bars))
            .unwrap_or_default()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        lock(&self.shared.state).unload();
    }
}
