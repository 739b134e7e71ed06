//now people using the types library can use these types
pub mod alert;
pub mod events;
pub mod interview;
pub mod transcript;

//re-export types for easier access
pub use alert::Alert;
pub use events::{ClientEvent, ServerEvent};
pub use interview::{
    ChatRequest, ChatResponse, EndResponse, InterviewId, InterviewType, SetupRequest,
    SetupResponse, StartResponse, WarningResponse,
};
pub use transcript::{Role, Transcript, TranscriptEntry};
