//! Playback infrastructure module
//!
//! Audio output through rodio on the default device.

mod rodio_output;

pub use rodio_output::{decode_bytes, RodioContext, RodioNode, RodioOutput};
