//! Chunk assembler for asynchronously delivered capture data

use crate::domain::audio::AudioBlob;

/// Ordered accumulation of encoded fragments for one capture session.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Empty fragments are dropped and return `false`.
    pub fn push(&mut self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Whether any non-empty fragment arrived since the last clear
    pub fn has_received_data(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Concatenate everything received so far, in arrival order.
    /// Chunks are kept so a later call can assemble a longer clip.
    pub fn assemble(&self, mime_type: &str) -> Option<AudioBlob> {
        if self.total_bytes == 0 {
            return None;
        }
        let mut data = Vec::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            data.extend_from_slice(chunk);
        }
        Some(AudioBlob::new(data, mime_type))
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }
}
