//! Domain error types

use thiserror::Error;

/// Error when a recording limit is malformed or out of range
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid duration \"{input}\": use seconds or h/m/s units (90, 45s, 2m30s, 1h), from 1s up to 1h")]
pub struct LimitParseError {
    pub input: String,
}

/// Error when a MIME type or file extension is absent from the format table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported audio format: \"{input}\". Known formats: webm, ogg, m4a, mp3, wav")]
pub struct UnsupportedFormatError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_names_input() {
        let err = UnsupportedFormatError {
            input: "flac".to_string(),
        };
        assert!(err.to_string().contains("\"flac\""));
    }

    #[test]
    fn validation_error_names_key() {
        let err = ConfigError::ValidationError {
            key: "max_duration".to_string(),
            message: "bad".to_string(),
        };
        assert!(err.to_string().contains("max_duration"));
    }
}
