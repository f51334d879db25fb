//! Object URLs for in-memory clips
//!
//! Lets a finished recording be handed to anything that takes a source
//! locator (`blob:voice-memo/<n>`) without touching the filesystem.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use super::lock;
use crate::domain::audio::AudioBlob;

const URL_PREFIX: &str = "blob:voice-memo/";

/// Registry of transient `blob:` URLs
#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<String, AudioBlob>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by the recorder and the global player
    pub fn global() -> Arc<BlobRegistry> {
        static GLOBAL: OnceLock<Arc<BlobRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(BlobRegistry::new())))
    }

    /// Register `blob` and return a fresh URL naming it
    pub fn create_url(&self, blob: AudioBlob) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let url = format!("{}{}", URL_PREFIX, id);
        lock(&self.blobs).insert(url.clone(), blob);
        url
    }

    pub fn resolve(&self, url: &str) -> Option<AudioBlob> {
        lock(&self.blobs).get(url).cloned()
    }

    /// Forget `url`. Returns whether it was registered.
    pub fn revoke(&self, url: &str) -> bool {
        lock(&self.blobs).remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
