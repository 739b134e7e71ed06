use interview_types::{ChatRequest, ChatResponse, InterviewId, StartResponse, Transcript};

/// Answer sent on the candidate's behalf when time runs out.
pub const TIME_EXPIRED_ANSWER: &str = "[Time expired]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Interviewing,
    AwaitingResponse,
    Finished,
    Terminated,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Terminated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    TimeExpired,
    ViolationThreshold,
    Manual,
}

/// Identifies one outstanding answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Answer,
    /// The time-expired closing exchange.
    Closing,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub ticket: Ticket,
    pub kind: SubmissionKind,
    pub request: ChatRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("not accepting answers while {0:?}")]
    NotAccepting(Phase),
    #[error("answer is empty")]
    EmptyAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The next question is ready.
    NextQuestion {
        question: String,
        round: u32,
        audio_url: Option<String>,
        time_warning: bool,
    },
    /// The interview is over. `closing` is absent when the closing exchange
    /// failed or timed out.
    Finished {
        closing: Option<String>,
        audio_url: Option<String>,
    },
    /// The submission failed. The candidate may answer again.
    Failed { error: String },
    /// The response belongs to a superseded submission.
    Stale,
}

/// Owns the question/answer cycle: phase, round, and transcript.
#[derive(Debug)]
pub struct TurnController {
    interview_id: InterviewId,
    phase: Phase,
    round: u32,
    question: String,
    transcript: Transcript,
    next_ticket: u64,
    in_flight: Option<(Ticket, SubmissionKind)>,
    closing: bool,
}

impl TurnController {
    pub fn new(interview_id: InterviewId, opening: &StartResponse) -> Self {
        let mut transcript = Transcript::new();
        transcript.push_ai(opening.question());
        Self {
            interview_id,
            phase: if opening.is_finished() {
                Phase::Finished
            } else {
                Phase::Interviewing
            },
            round: opening.round().max(1),
            question: opening.question().to_string(),
            transcript,
            next_ticket: 0,
            in_flight: None,
            closing: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn current_question(&self) -> &str {
        &self.question
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn issue(&mut self, kind: SubmissionKind) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        if let Some((superseded, _)) = self.in_flight.replace((ticket, kind)) {
            tracing::debug!("submission {:?} superseded by {:?}", superseded, ticket);
        }
        ticket
    }

    /// Records the candidate's answer and hands back the request to send.
    pub fn submit_answer(&mut self, text: &str, elapsed_seconds: u64) -> Result<Submission, TurnError> {
        if self.phase != Phase::Interviewing {
            return Err(TurnError::NotAccepting(self.phase));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyAnswer);
        }

        self.transcript.push_user(text);
        self.phase = Phase::AwaitingResponse;
        let ticket = self.issue(SubmissionKind::Answer);
        Ok(Submission {
            ticket,
            kind: SubmissionKind::Answer,
            request: ChatRequest::new(self.interview_id.clone(), text, elapsed_seconds),
        })
    }

    /// Starts the closing exchange, superseding any answer still in flight.
    ///
    /// `None` if the session already ended or is already closing.
    pub fn submit_time_expired(&mut self, elapsed_seconds: u64) -> Option<Submission> {
        if self.phase.is_terminal() || self.closing {
            return None;
        }
        self.closing = true;
        self.transcript.push_user(TIME_EXPIRED_ANSWER);
        self.phase = Phase::AwaitingResponse;
        let ticket = self.issue(SubmissionKind::Closing);
        Some(Submission {
            ticket,
            kind: SubmissionKind::Closing,
            request: ChatRequest::new(
                self.interview_id.clone(),
                TIME_EXPIRED_ANSWER,
                elapsed_seconds,
            ),
        })
    }

    /// Applies the result of the submission identified by `ticket`.
    pub fn resolve(&mut self, ticket: Ticket, result: Result<ChatResponse, String>) -> TurnOutcome {
        let kind = match self.in_flight {
            Some((current, kind)) if current == ticket && !self.phase.is_terminal() => kind,
            _ => {
                // Late replies are kept for the record but steer nothing.
                match result {
                    Ok(response) => self.transcript.push_ai(response.question()),
                    Err(e) => tracing::debug!("stale submission {:?} failed: {}", ticket, e),
                }
                return TurnOutcome::Stale;
            }
        };
        self.in_flight = None;

        match (kind, result) {
            (SubmissionKind::Answer, Ok(response)) => {
                self.transcript.push_ai(response.question());
                if response.is_finished() {
                    self.phase = Phase::Finished;
                    return TurnOutcome::Finished {
                        closing: Some(response.question().to_string()),
                        audio_url: response.audio_url().map(str::to_string),
                    };
                }
                self.round += 1;
                if response.round() != 0 && response.round() != self.round {
                    tracing::debug!(
                        "backend reports round {}, local round is {}",
                        response.round(),
                        self.round
                    );
                }
                self.question = response.question().to_string();
                self.phase = Phase::Interviewing;
                TurnOutcome::NextQuestion {
                    question: self.question.clone(),
                    round: self.round,
                    audio_url: response.audio_url().map(str::to_string),
                    time_warning: response.time_warning(),
                }
            }
            (SubmissionKind::Answer, Err(error)) => {
                tracing::warn!("answer submission failed: {}", error);
                self.phase = Phase::Interviewing;
                TurnOutcome::Failed { error }
            }
            (SubmissionKind::Closing, Ok(response)) => {
                self.transcript.push_ai(response.question());
                self.phase = Phase::Finished;
                TurnOutcome::Finished {
                    closing: Some(response.question().to_string()),
                    audio_url: response.audio_url().map(str::to_string),
                }
            }
            (SubmissionKind::Closing, Err(error)) => {
                tracing::warn!("closing exchange failed: {}", error);
                self.phase = Phase::Finished;
                TurnOutcome::Finished {
                    closing: None,
                    audio_url: None,
                }
            }
        }
    }

    /// Ends the session as terminated. Returns false if it had already ended.
    pub fn terminate(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = Phase::Terminated;
        self.in_flight = None;
        true
    }

    /// Ends the session as finished without waiting for anything in flight.
    pub fn finish(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = Phase::Finished;
        self.in_flight = None;
        true
    }
}
