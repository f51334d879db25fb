//! Rodio-based audio output adapter
//!
//! Each context owns an output stream on a dedicated thread and plays
//! nodes as rodio sinks fed from the decoded buffer.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::{Duration, Instant};

use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::oneshot;

use crate::application::ports::{AudioOutput, DecodeContext, PlaybackError, PlaybackNode};
use crate::domain::audio::DecodedAudio;
use crate::infrastructure::capture::wav;

/// How often a node's watcher checks for the end of its sink
const WATCH_INTERVAL: Duration = Duration::from_millis(20);

/// Decode any container rodio understands into interleaved `f32` PCM
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedAudio, PlaybackError> {
    if bytes.is_empty() {
        return Err(PlaybackError::Load("audio data is empty".into()));
    }

    let sealed = wav::seal_streaming_header(bytes.to_vec());
    let decoder = Decoder::new(Cursor::new(sealed))
        .map_err(|e| PlaybackError::Load(format!("Failed to decode audio: {}", e)))?;

    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    Ok(DecodedAudio::new(samples, channels, sample_rate))
}

/// Seconds of running time, excluding suspended intervals
#[derive(Debug)]
struct RunningClock {
    origin: Instant,
    suspended_since: Option<Instant>,
    suspended_total: Duration,
}

impl RunningClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            suspended_since: None,
            suspended_total: Duration::ZERO,
        }
    }

    fn now(&self) -> f64 {
        let reference = self.suspended_since.unwrap_or_else(Instant::now);
        reference
            .saturating_duration_since(self.origin)
            .saturating_sub(self.suspended_total)
            .as_secs_f64()
    }

    fn is_suspended(&self) -> bool {
        self.suspended_since.is_some()
    }

    fn suspend(&mut self) {
        if self.suspended_since.is_none() {
            self.suspended_since = Some(Instant::now());
        }
    }

    fn resume(&mut self) {
        if let Some(since) = self.suspended_since.take() {
            self.suspended_total += since.elapsed();
        }
    }
}

/// Output on the default rodio device
#[derive(Debug, Default)]
pub struct RodioOutput;

impl RodioOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for RodioOutput {
    fn open_context(&self) -> Result<Box<dyn DecodeContext>, PlaybackError> {
        let (handle_tx, handle_rx) = std_mpsc::channel();
        let (close_tx, close_rx) = std_mpsc::channel::<()>();

        // OutputStream is not Send, so it stays on this thread until closed
        std::thread::Builder::new()
            .name("voice-memo-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = handle_tx.send(Ok(handle));
                    let _ = close_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(PlaybackError::Load(format!(
                        "Audio output not available: {}",
                        e
                    ))));
                }
            })
            .map_err(|e| PlaybackError::Load(format!("Failed to spawn output thread: {}", e)))?;

        let handle = handle_rx
            .recv()
            .map_err(|_| PlaybackError::Load("output thread exited".into()))??;

        tracing::debug!("audio output context opened");
        Ok(Box::new(RodioContext {
            handle,
            clock: RunningClock::new(),
            close_tx: Some(close_tx),
        }))
    }
}

/// Decode context bound to one output stream
pub struct RodioContext {
    handle: OutputStreamHandle,
    clock: RunningClock,
    close_tx: Option<std_mpsc::Sender<()>>,
}

impl DecodeContext for RodioContext {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, PlaybackError> {
        decode_bytes(bytes)
    }

    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn is_suspended(&self) -> bool {
        self.clock.is_suspended()
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.close_tx.is_none() {
            return Err(PlaybackError::Playback("audio context is closed".into()));
        }
        self.clock.resume();
        Ok(())
    }

    fn suspend(&mut self) {
        self.clock.suspend();
    }

    fn start_node(
        &mut self,
        buffer: Arc<DecodedAudio>,
        offset: f64,
        ended: oneshot::Sender<()>,
    ) -> Result<Box<dyn PlaybackNode>, PlaybackError> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| PlaybackError::Playback(e.to_string()))?;
        sink.append(SamplesBuffer::new(
            buffer.channels(),
            buffer.sample_rate(),
            buffer.samples_from(offset).to_vec(),
        ));

        let sink = Arc::new(sink);
        let stopped = Arc::new(AtomicBool::new(false));

        let watched = Arc::clone(&sink);
        let watch_stopped = Arc::clone(&stopped);
        std::thread::Builder::new()
            .name("voice-memo-node".into())
            .spawn(move || loop {
                if watch_stopped.load(Ordering::SeqCst) {
                    return;
                }
                if watched.empty() {
                    let _ = ended.send(());
                    return;
                }
                std::thread::sleep(WATCH_INTERVAL);
            })
            .map_err(|e| PlaybackError::Playback(format!("Failed to spawn node watcher: {}", e)))?;

        Ok(Box::new(RodioNode { sink, stopped }))
    }

    fn close(&mut self) {
        if self.close_tx.take().is_some() {
            tracing::debug!("audio output context closed");
        }
    }
}

impl Drop for RodioContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// One sink playing a slice of the decoded buffer
pub struct RodioNode {
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
}

impl PlaybackNode for RodioNode {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
    }
}
