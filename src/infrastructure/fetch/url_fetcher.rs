//! Source fetcher for http(s), file, data and blob locators

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::fs;

use crate::application::ports::{PlaybackError, SourceFetcher};
use crate::application::BlobRegistry;
use crate::domain::playback::{LocatorKind, SourceLocator};

/// Fetches the bytes behind any supported [`SourceLocator`]
pub struct UrlFetcher {
    client: reqwest::Client,
    blobs: Arc<BlobRegistry>,
}

impl UrlFetcher {
    /// Create a fetcher resolving `blob:` URLs against `blobs`
    pub fn new(blobs: Arc<BlobRegistry>) -> Self {
        Self {
            client: reqwest::Client::new(),
            blobs,
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, PlaybackError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PlaybackError::Load(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaybackError::Load(format!("HTTP {} for {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlaybackError::Load(format!("Failed to read body: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// Decode the payload of a `data:` URL
    fn decode_data_url(url: &str) -> Result<Vec<u8>, PlaybackError> {
        let rest = url
            .get("data:".len()..)
            .ok_or_else(|| PlaybackError::Load("malformed data URL".into()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| PlaybackError::Load("data URL has no payload".into()))?;

        let is_base64 = meta
            .split(';')
            .any(|param| param.trim().eq_ignore_ascii_case("base64"));

        if is_base64 {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| PlaybackError::Load(format!("Invalid base64 in data URL: {}", e)))
        } else {
            percent_decode(payload)
        }
    }
}

fn percent_decode(input: &str) -> Result<Vec<u8>, PlaybackError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| PlaybackError::Load("Invalid percent escape in data URL".into()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[async_trait]
impl SourceFetcher for UrlFetcher {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Vec<u8>, PlaybackError> {
        let bytes = match locator.kind() {
            LocatorKind::Remote => self.fetch_remote(locator.as_str()).await?,
            LocatorKind::File(path) => fs::read(&path).await.map_err(|e| {
                PlaybackError::Load(format!("Failed to read {}: {}", path.display(), e))
            })?,
            LocatorKind::Data => Self::decode_data_url(locator.as_str())?,
            LocatorKind::Blob => self
                .blobs
                .resolve(locator.as_str())
                .map(|blob| blob.to_vec())
                .ok_or_else(|| {
                    PlaybackError::Load(format!("Unknown or revoked blob URL: {}", locator))
                })?,
            LocatorKind::Unsupported(scheme) => {
                return Err(PlaybackError::Load(format!(
                    "Unsupported URL scheme: {}",
                    scheme
                )))
            }
        };

        tracing::debug!(%locator, bytes = bytes.len(), "fetched audio source");
        Ok(bytes)
    }
}
