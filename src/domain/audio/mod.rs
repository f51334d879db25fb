//! Audio value objects shared by recording and playback

mod blob;
mod decoded;

pub use blob::AudioBlob;
pub use decoded::DecodedAudio;
