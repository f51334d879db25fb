//! Encoding-format table
//!
//! Ordered candidates for the capture encoding. Lower priority values are
//! preferred. The same table maps MIME types to file extensions for export.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::error::UnsupportedFormatError;

/// MIME type tried when no table entry is supported by the input.
pub const DEFAULT_MIME: &str = "audio/webm";

/// One candidate capture encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingFormat {
    pub mime: &'static str,
    pub extension: &'static str,
    pub priority: u8,
    /// Typical bitrate, used for size estimates only
    pub bitrate_kbps: u32,
}

impl EncodingFormat {
    /// MIME type without parameters, lowercased (`audio/webm;codecs=opus` -> `audio/webm`)
    pub fn base_mime(&self) -> String {
        base_type(self.mime)
    }

    /// Rough encoded size for a clip of `seconds`
    pub fn estimate_size_bytes(&self, seconds: u64) -> u64 {
        u64::from(self.bitrate_kbps) * 1000 / 8 * seconds
    }
}

pub const FORMAT_TABLE: &[EncodingFormat] = &[
    EncodingFormat {
        mime: "audio/webm;codecs=opus",
        extension: "webm",
        priority: 1,
        bitrate_kbps: 32,
    },
    EncodingFormat {
        mime: "audio/ogg;codecs=opus",
        extension: "ogg",
        priority: 2,
        bitrate_kbps: 32,
    },
    EncodingFormat {
        mime: "audio/mp4",
        extension: "m4a",
        priority: 3,
        bitrate_kbps: 64,
    },
    EncodingFormat {
        mime: "audio/mpeg",
        extension: "mp3",
        priority: 4,
        bitrate_kbps: 128,
    },
    EncodingFormat {
        mime: "audio/wav",
        extension: "wav",
        priority: 5,
        bitrate_kbps: 768,
    },
];

fn base_type(mime: &str) -> String {
    mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase()
}

/// Table entries sorted by priority
pub fn by_priority() -> Vec<EncodingFormat> {
    let mut formats = FORMAT_TABLE.to_vec();
    formats.sort_by_key(|f| f.priority);
    formats
}

/// Look up a format by file extension (leading dot allowed)
pub fn by_extension(extension: &str) -> Result<EncodingFormat, UnsupportedFormatError> {
    let wanted = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    FORMAT_TABLE
        .iter()
        .find(|f| f.extension == wanted)
        .copied()
        .ok_or_else(|| UnsupportedFormatError {
            input: extension.to_string(),
        })
}

/// Look up a format by MIME type. An exact match wins; otherwise the base
/// type is compared with parameters ignored.
pub fn by_mime(mime: &str) -> Result<EncodingFormat, UnsupportedFormatError> {
    let trimmed = mime.trim();
    if let Some(exact) = FORMAT_TABLE
        .iter()
        .find(|f| f.mime.eq_ignore_ascii_case(trimmed))
    {
        return Ok(*exact);
    }

    let wanted = base_type(trimmed);
    by_priority()
        .into_iter()
        .find(|f| f.base_mime() == wanted)
        .ok_or_else(|| UnsupportedFormatError {
            input: mime.to_string(),
        })
}

/// Pick the preferred format the platform supports, falling back to
/// [`DEFAULT_MIME`] and failing when even that is unsupported.
pub fn select_supported<F>(is_supported: F) -> Result<EncodingFormat, UnsupportedFormatError>
where
    F: Fn(&EncodingFormat) -> bool,
{
    if let Some(format) = by_priority().into_iter().find(|f| is_supported(f)) {
        return Ok(format);
    }

    let fallback = by_mime(DEFAULT_MIME)?;
    if is_supported(&fallback) {
        Ok(fallback)
    } else {
        Err(UnsupportedFormatError {
            input: DEFAULT_MIME.to_string(),
        })
    }
}

/// Export filename: `recording-<timestamp>.<ext>` with the colons and dots
/// of the RFC 3339 timestamp replaced by dashes.
pub fn generate_filename(format: &EncodingFormat, timestamp: DateTime<Utc>) -> String {
    let stamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("recording-{}.{}", stamp, format.extension)
}
