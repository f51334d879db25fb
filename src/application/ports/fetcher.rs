//! Source fetcher port interface

use async_trait::async_trait;

use super::output::PlaybackError;
use crate::domain::playback::SourceLocator;

/// Port for retrieving the raw bytes behind a source locator
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the encoded audio named by `locator`.
    ///
    /// # Returns
    /// The raw bytes, or `PlaybackError::Load` when the locator cannot be read
    async fn fetch(&self, locator: &SourceLocator) -> Result<Vec<u8>, PlaybackError>;
}
