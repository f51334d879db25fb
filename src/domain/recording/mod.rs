//! Recording domain module

mod chunks;
mod constraints;
mod limit;
pub mod format;
mod status;

pub use chunks::ChunkAssembler;
pub use constraints::{CaptureConstraints, Platform};
pub use limit::{RecordingLimit, DEFAULT_LIMIT_SECS, MAX_LIMIT_SECS};
pub use format::{EncodingFormat, DEFAULT_MIME, FORMAT_TABLE};
pub use status::{
    next_status, InvalidStateTransition, RecordingAction, RecordingLifecycle, RecordingStatus,
};
