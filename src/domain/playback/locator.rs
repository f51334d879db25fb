//! Source locators accepted by the playback engine

use std::fmt;
use std::path::PathBuf;

/// How a locator should be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorKind {
    /// `http://` or `https://`
    Remote,
    /// `file://` URL or a bare filesystem path
    File(PathBuf),
    /// Inline `data:` URL
    Data,
    /// `blob:` URL naming an in-memory clip
    Blob,
    /// Any other scheme
    Unsupported(String),
}

/// A URL string (remote, file, data or blob-backed) naming audio to load
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocator(String);

impl SourceLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> LocatorKind {
        let url = self.0.as_str();
        let lower = url.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            LocatorKind::Remote
        } else if lower.starts_with("file://") {
            LocatorKind::File(PathBuf::from(&url["file://".len()..]))
        } else if lower.starts_with("data:") {
            LocatorKind::Data
        } else if lower.starts_with("blob:") {
            LocatorKind::Blob
        } else if let Some((scheme, _)) = url.split_once("://") {
            LocatorKind::Unsupported(scheme.to_string())
        } else {
            LocatorKind::File(PathBuf::from(url))
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Data URLs can be megabytes long
        if self.0.len() > 64 && self.kind() == LocatorKind::Data {
            let head: String = self.0.chars().take(32).collect();
            write!(f, "{}...", head)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for SourceLocator {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for SourceLocator {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_schemes() {
        assert_eq!(SourceLocator::new("https://x/a.wav").kind(), LocatorKind::Remote);
        assert_eq!(SourceLocator::new("HTTP://x/a.wav").kind(), LocatorKind::Remote);
        assert_eq!(SourceLocator::new("data:audio/wav;base64,AA==").kind(), LocatorKind::Data);
        assert_eq!(SourceLocator::new("blob:voice-memo/1").kind(), LocatorKind::Blob);
        assert_eq!(
            SourceLocator::new("ftp://host/a.wav").kind(),
            LocatorKind::Unsupported("ftp".to_string())
        );
    }

    #[test]
    fn file_urls_and_paths() {
        assert_eq!(
            SourceLocator::new("file:///tmp/a.wav").kind(),
            LocatorKind::File(PathBuf::from("/tmp/a.wav"))
        );
        assert_eq!(
            SourceLocator::new(" clips/a.wav ").kind(),
            LocatorKind::File(PathBuf::from("clips/a.wav"))
        );
    }

    #[test]
    fn long_data_urls_are_shortened_in_display() {
        let url = format!("data:audio/wav;base64,{}", "A".repeat(200));
        let shown = SourceLocator::new(url).to_string();
        assert!(shown.len() < 40);
        assert!(shown.ends_with("..."));
    }
}
