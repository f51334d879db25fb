//! Recording lifecycle state machine

use std::fmt;
use thiserror::Error;

/// Recording states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordingStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl RecordingStatus {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// Whether a capture session is live in this state
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingAction {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
}

impl RecordingAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start recording",
            Self::Pause => "pause recording",
            Self::Resume => "resume recording",
            Self::Stop => "stop recording",
            Self::Reset => "reset",
        }
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: RecordingStatus,
    pub action: String,
}

/// Transition table.
///
/// ```text
///   IDLE | STOPPED    -> RECORDING (start)
///   RECORDING         -> PAUSED    (pause)
///   PAUSED            -> RECORDING (resume)
///   RECORDING | PAUSED -> STOPPED  (stop)
///   *                 -> IDLE      (reset)
/// ```
pub fn next_status(
    current: RecordingStatus,
    action: RecordingAction,
) -> Result<RecordingStatus, InvalidStateTransition> {
    use RecordingAction as A;
    use RecordingStatus as S;

    let next = match (current, action) {
        (S::Idle | S::Stopped, A::Start) => Some(S::Recording),
        (S::Recording, A::Pause) => Some(S::Paused),
        (S::Paused, A::Resume) => Some(S::Recording),
        (S::Recording | S::Paused, A::Stop) => Some(S::Stopped),
        (_, A::Reset) => Some(S::Idle),
        _ => None,
    };

    next.ok_or_else(|| InvalidStateTransition {
        current_state: current,
        action: action.as_str().to_string(),
    })
}

/// Recording lifecycle entity. Holds the current status and only moves it
/// along the transition table.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    status: RecordingStatus,
}

impl RecordingLifecycle {
    /// Create a lifecycle in idle state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    /// Apply a transition, leaving the status untouched on failure
    pub fn apply(&mut self, action: RecordingAction) -> Result<RecordingStatus, InvalidStateTransition> {
        let next = next_status(self.status, action)?;
        self.status = next;
        Ok(next)
    }

    pub fn start(&mut self) -> Result<RecordingStatus, InvalidStateTransition> {
        self.apply(RecordingAction::Start)
    }

    pub fn pause(&mut self) -> Result<RecordingStatus, InvalidStateTransition> {
        self.apply(RecordingAction::Pause)
    }

    pub fn resume(&mut self) -> Result<RecordingStatus, InvalidStateTransition> {
        self.apply(RecordingAction::Resume)
    }

    pub fn stop(&mut self) -> Result<RecordingStatus, InvalidStateTransition> {
        self.apply(RecordingAction::Stop)
    }

    /// Reset never fails
    pub fn reset(&mut self) {
        self.status = RecordingStatus::Idle;
    }
}
