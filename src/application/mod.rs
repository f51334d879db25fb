//! Application layer - Use cases and port interfaces
//!
//! Contains the recording and playback services and the trait
//! definitions for external system interactions.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod blob_registry;
pub mod playback;
pub mod ports;
pub mod recording;
pub mod subscription;

// Re-export services
pub use blob_registry::BlobRegistry;
pub use playback::PlaybackEngine;
pub use recording::{RecorderConfig, RecordingController, RecordingView};
pub use subscription::{SnapshotBus, Subscription};

/// Lock a state mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
