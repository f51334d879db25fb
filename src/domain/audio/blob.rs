//! Audio blob value object

use std::fmt;
use std::sync::Arc;

/// Value object representing a finished clip: encoded bytes tagged with
/// a MIME-like type string.
///
/// The bytes are shared, so cloning a blob is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioBlob {
    data: Arc<[u8]>,
    mime_type: String,
}

impl AudioBlob {
    /// Create an AudioBlob from raw bytes
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Create an AudioBlob from a byte slice
    pub fn from_bytes(data: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: Arc::from(data),
            mime_type: mime_type.into(),
        }
    }

    /// Get the raw audio data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy the raw audio data out of the blob
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Get the MIME type
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

impl fmt::Debug for AudioBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBlob")
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}
