//! Capture infrastructure module
//!
//! Microphone input through cpal, framed as streaming WAV.

mod cpal_input;
pub mod wav;

pub use cpal_input::{CpalCaptureEngine, CpalInput, CpalStream, LEVEL_HISTORY};
