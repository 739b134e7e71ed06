pub mod backend;
pub mod relay;
pub mod session;
pub mod settings;
#[cfg(test)]
mod testing;
pub mod timer;
pub mod turn;
pub mod violation;

use interview_types::{Alert, TranscriptEntry};
use violation::ViolationSource;

pub use backend::{
    BackendError, HttpBackend, InterviewBackend, ResumeUpload, SetupError, validate_setup,
};
pub use session::{InterviewSession, SessionContext, SessionInput, SessionOutcome};
pub use settings::SessionSettings;
pub use turn::{Phase, TerminationReason};

/// Commands the session issues to the surrounding application.
///
/// The session never renders or plays anything itself. It decides, and the
/// runtime executes these side effects (showing text, playing audio, raising
/// overlays).
#[derive(Debug, Clone)]
pub enum Command {
    /// Show the current question and play its audio, if any.
    AskQuestion {
        text: String,
        round: u32,
        audio_url: Option<String>,
    },
    /// The interviewer's closing remark once the interview is finished.
    Closing {
        text: String,
        audio_url: Option<String>,
    },
    /// One second passed. Lossy: dropped if the runtime falls behind.
    Tick { elapsed: u64, remaining: u64 },
    /// Advisory, sent at most once per session.
    LowTime { remaining: u64 },
    AlertChanged(Alert),
    Warning {
        source: ViolationSource,
        count: u32,
        message: String,
    },
    /// The trailing transcript window for display.
    Transcript(Vec<TranscriptEntry>),
    Listening,
    CameraActive,
    /// The proctor is gone. The interview goes on without classification.
    ProctoringLost,
    /// A local capability (camera or speech) cannot be used.
    CaptureUnavailable(String),
    /// A remote call failed; the candidate may retry.
    RecoverableError(String),
    SessionEnded(SessionOutcome),
}
