//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with cpal, rodio, HTTP and the filesystem.

pub mod capture;
pub mod config;
pub mod fetch;
pub mod playback;

// Re-export adapters
pub use capture::{CpalCaptureEngine, CpalInput};
pub use config::XdgConfigStore;
pub use fetch::UrlFetcher;
pub use playback::RodioOutput;
