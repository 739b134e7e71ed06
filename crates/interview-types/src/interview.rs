use std::fmt;

/// Interview lengths, in minutes, the backend accepts at setup.
pub const ALLOWED_DURATIONS: [u32; 7] = [5, 10, 15, 20, 30, 45, 60];

/// Opaque identifier the backend assigns at setup.
///
/// The backend currently hands out integers but nothing on this side relies
/// on that, so both JSON numbers and strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterviewId(String);

impl InterviewId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for InterviewId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for InterviewId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => InterviewId(n.to_string()),
            Raw::Text(s) => InterviewId(s),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Technical,
    Hr,
    #[default]
    Mixed,
}

impl std::str::FromStr for InterviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "technical" => Ok(InterviewType::Technical),
            "hr" => Ok(InterviewType::Hr),
            "mixed" => Ok(InterviewType::Mixed),
            other => Err(format!(
                "interview type must be one of technical, hr, mixed (got '{other}')"
            )),
        }
    }
}

/// `POST /api/interview/setup` body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SetupRequest {
    duration_minutes: u32,
    interview_type: InterviewType,
    /// Comma separated skill list.
    skills: String,
}

impl SetupRequest {
    pub fn new(duration_minutes: u32, interview_type: InterviewType) -> Self {
        Self {
            duration_minutes,
            interview_type,
            skills: String::new(),
        }
    }

    pub fn with_skills<S: AsRef<str>>(mut self, skills: &[S]) -> Self {
        self.skills = skills
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        self
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn interview_type(&self) -> InterviewType {
        self.interview_type
    }

    pub fn skills(&self) -> &str {
        &self.skills
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SetupResponse {
    interview_id: InterviewId,
    #[serde(default)]
    message: Option<String>,
}

impl SetupResponse {
    pub fn new(interview_id: InterviewId) -> Self {
        Self {
            interview_id,
            message: None,
        }
    }

    pub fn interview_id(&self) -> &InterviewId {
        &self.interview_id
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Response to the resume upload that opens the interview.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartResponse {
    question: String,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default = "first_round")]
    round: u32,
    #[serde(default)]
    is_finished: bool,
}

fn first_round() -> u32 {
    1
}

impl StartResponse {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            audio_url: None,
            round: 1,
            is_finished: false,
        }
    }

    pub fn with_audio_url(mut self, audio_url: &str) -> Self {
        self.audio_url = Some(audio_url.to_string());
        self
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished
    }
}

/// Form body of `POST /api/interview/chat`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    interview_id: InterviewId,
    user_answer: String,
    elapsed_seconds: u64,
}

impl ChatRequest {
    pub fn new(interview_id: InterviewId, user_answer: &str, elapsed_seconds: u64) -> Self {
        Self {
            interview_id,
            user_answer: user_answer.to_string(),
            elapsed_seconds,
        }
    }

    pub fn interview_id(&self) -> &InterviewId {
        &self.interview_id
    }

    pub fn user_answer(&self) -> &str {
        &self.user_answer
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatResponse {
    question: String,
    #[serde(default)]
    round: u32,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    is_finished: bool,
    #[serde(default)]
    time_warning: bool,
    #[serde(default)]
    time_remaining: Option<u64>,
}

impl ChatResponse {
    pub fn new(question: &str, round: u32) -> Self {
        Self {
            question: question.to_string(),
            round,
            audio_url: None,
            is_finished: false,
            time_warning: false,
            time_remaining: None,
        }
    }

    pub fn with_audio_url(mut self, audio_url: &str) -> Self {
        self.audio_url = Some(audio_url.to_string());
        self
    }

    pub fn with_finished(mut self, is_finished: bool) -> Self {
        self.is_finished = is_finished;
        self
    }

    pub fn with_time_warning(mut self, time_warning: bool) -> Self {
        self.time_warning = time_warning;
        self
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    pub fn time_warning(&self) -> bool {
        self.time_warning
    }

    pub fn time_remaining(&self) -> Option<u64> {
        self.time_remaining
    }
}

/// Response of `POST /api/interview/warning/{id}`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WarningResponse {
    #[serde(default)]
    warning_count: u32,
    #[serde(default)]
    terminate: bool,
    #[serde(default)]
    message: Option<String>,
}

impl WarningResponse {
    pub fn new(warning_count: u32, terminate: bool) -> Self {
        Self {
            warning_count,
            terminate,
            message: None,
        }
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn terminate(&self) -> bool {
        self.terminate
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Response of `POST /api/interview/end/{id}`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EndResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    report_id: Option<i64>,
}

impl EndResponse {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn report_id(&self) -> Option<i64> {
        self.report_id
    }
}
