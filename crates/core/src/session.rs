use crate::Command;
use crate::backend::{BackendError, InterviewBackend};
use crate::relay::{self, CameraWatch, ProctorLink, RelayEvent, RelayHandle};
use crate::settings::SessionSettings;
use crate::timer::{self, Countdown, TimerEvent, TimerHandle};
use crate::turn::{
    Phase, Submission, SubmissionKind, TerminationReason, Ticket, TurnController, TurnOutcome,
};
use crate::violation::{FocusSignal, ViolationEvent, ViolationOutcome, ViolationTracker};
use interview_capture::{CameraProvider, CaptureDevice, CaptureError, SpeechRecognizer};
use interview_types::events::AlertEvent;
use interview_types::{
    Alert, ChatResponse, InterviewId, StartResponse, Transcript, TranscriptEntry, WarningResponse,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything a session needs to know about its interview. Passed in, never
/// looked up.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub interview_id: InterviewId,
    pub duration_secs: u64,
    pub settings: SessionSettings,
}

impl SessionContext {
    pub fn new(interview_id: InterviewId, duration_minutes: u32) -> Self {
        Self {
            interview_id,
            duration_secs: u64::from(duration_minutes) * 60,
            settings: SessionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// What the surrounding application may tell a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// A typed answer.
    Answer(String),
    /// Capture one spoken answer.
    StartListening,
    FocusLost(FocusSignal),
    ActivateCamera,
    /// The candidate ended the interview.
    End,
}

// Completions of work the session spawned itself.
enum Internal {
    Timer(TimerEvent),
    Relay(RelayEvent),
    Heard {
        generation: u64,
        result: Result<String, CaptureError>,
    },
    CameraAcquired(Result<Arc<dyn CaptureDevice>, CaptureError>),
    TurnResolved {
        ticket: Ticket,
        result: Result<ChatResponse, String>,
    },
    ViolationReported(Result<WarningResponse, String>),
}

enum Next {
    Internal(Option<Internal>),
    Input(Option<SessionInput>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SessionOutcome {
    pub interview_id: InterviewId,
    pub phase: Phase,
    pub termination_reason: Option<TerminationReason>,
    pub round: u32,
    pub violation_count: u32,
    pub elapsed_seconds: u64,
    pub duration_seconds: u64,
    pub transcript: Transcript,
}

struct CameraSlot {
    tx: watch::Sender<Option<Arc<dyn CaptureDevice>>>,
    pending: bool,
    released: bool,
}

impl CameraSlot {
    fn new() -> Self {
        let (tx, _) = watch::channel::<Option<Arc<dyn CaptureDevice>>>(None);
        Self {
            tx,
            pending: false,
            released: false,
        }
    }

    fn subscribe(&self) -> CameraWatch {
        self.tx.subscribe()
    }

    fn is_active(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// False if the slot was already released; the device is released then.
    fn install(&mut self, device: Arc<dyn CaptureDevice>) -> bool {
        self.pending = false;
        if self.released {
            device.release();
            return false;
        }
        if let Some(previous) = self.tx.send_replace(Some(device)) {
            previous.release();
        }
        true
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(device) = self.tx.send_replace(None) {
            device.release();
        }
    }
}

/// One live interview: countdown, proctoring, violations and the
/// question/answer cycle, driven from a single event loop.
///
/// Spawned work (timer, frame relay, remote calls, capture) reports back
/// through an internal queue, so all state changes happen in [`run`].
///
/// [`run`]: InterviewSession::run
pub struct InterviewSession {
    context: SessionContext,
    backend: Arc<dyn InterviewBackend>,
    turn: TurnController,
    violations: ViolationTracker,
    elapsed: u64,
    low_time_sent: bool,
    alert: Alert,
    termination_reason: Option<TerminationReason>,
    opening_audio: Option<String>,
    commands: mpsc::Sender<Command>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
    link: Option<Box<dyn ProctorLink>>,
    timer: Option<TimerHandle>,
    relay: Option<RelayHandle>,
    camera: CameraSlot,
    camera_provider: Option<Arc<dyn CameraProvider>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    listening: Option<(u64, CancellationToken)>,
    listen_generation: u64,
    released: bool,
}

impl InterviewSession {
    pub fn new(
        context: SessionContext,
        backend: Arc<dyn InterviewBackend>,
        opening: &StartResponse,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::channel(context.settings.channel_capacity);
        let violations = ViolationTracker::new(
            context.settings.violation_threshold,
            context.settings.focus_debounce,
        );
        Self {
            turn: TurnController::new(context.interview_id.clone(), opening),
            context,
            backend,
            violations,
            elapsed: 0,
            low_time_sent: false,
            alert: Alert::Ok,
            termination_reason: None,
            opening_audio: opening.audio_url().map(str::to_string),
            commands,
            internal_tx,
            internal_rx,
            link: None,
            timer: None,
            relay: None,
            camera: CameraSlot::new(),
            camera_provider: None,
            recognizer: None,
            listening: None,
            listen_generation: 0,
            released: false,
        }
    }

    pub fn with_proctor_link(mut self, link: impl ProctorLink + 'static) -> Self {
        self.link = Some(Box::new(link));
        self
    }

    pub fn with_camera(mut self, provider: Arc<dyn CameraProvider>) -> Self {
        self.camera_provider = Some(provider);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn phase(&self) -> Phase {
        self.turn.phase()
    }

    fn remaining(&self) -> u64 {
        self.context.duration_secs.saturating_sub(self.elapsed)
    }

    /// Runs the session to its end and reports how it went.
    ///
    /// Closing `inputs` counts as the candidate ending the interview.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<SessionInput>) -> SessionOutcome {
        tracing::info!(
            "interview {} started: {}s, {} violations allowed",
            self.context.interview_id,
            self.context.duration_secs,
            self.violations.threshold().saturating_sub(1)
        );
        self.start().await;

        let mut inputs_open = true;
        while !self.turn.phase().is_terminal() {
            let next = tokio::select! {
                event = self.internal_rx.recv() => Next::Internal(event),
                input = inputs.recv(), if inputs_open => Next::Input(input),
            };
            match next {
                Next::Internal(Some(event)) => self.handle_internal(event).await,
                Next::Internal(None) => break,
                Next::Input(Some(input)) => self.handle_input(input).await,
                Next::Input(None) => {
                    inputs_open = false;
                    tracing::info!("session inputs closed");
                    self.end_requested();
                }
            }
        }

        self.release().await;
        let outcome = self.outcome();
        tracing::info!(
            "interview {} ended: {:?} ({:?}), round {}, {} violations, {}s",
            outcome.interview_id,
            outcome.phase,
            outcome.termination_reason,
            outcome.round,
            outcome.violation_count,
            outcome.elapsed_seconds
        );
        self.send(Command::SessionEnded(outcome.clone())).await;
        outcome
    }

    async fn start(&mut self) {
        if self.turn.phase().is_terminal() {
            tracing::info!("interview was already finished when it started");
            if let Some(mut link) = self.link.take() {
                link.close();
            }
            let audio_url = self.opening_audio.take();
            self.send(Command::Closing {
                text: self.turn.current_question().to_string(),
                audio_url,
            })
            .await;
            return;
        }

        let countdown = Countdown::new(
            self.context.duration_secs,
            self.context.settings.low_time_threshold_secs,
        );
        self.timer = Some(timer::spawn_countdown(
            countdown,
            self.internal_tx.clone(),
            Internal::Timer,
        ));

        match self.link.take() {
            Some(link) => {
                self.relay = Some(relay::spawn_relay(
                    link,
                    self.camera.subscribe(),
                    self.context.settings.frame_interval,
                    self.internal_tx.clone(),
                    Internal::Relay,
                ));
            }
            None => tracing::warn!("no proctoring channel; frames will not be classified"),
        }

        let audio_url = self.opening_audio.take();
        self.send(Command::AskQuestion {
            text: self.turn.current_question().to_string(),
            round: self.turn.round(),
            audio_url,
        })
        .await;
        self.send_transcript().await;
    }

    async fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Answer(text) => self.submit_answer(&text).await,
            SessionInput::StartListening => self.start_listening().await,
            SessionInput::FocusLost(signal) => {
                let violation = ViolationEvent::focus_loss(signal, Instant::now());
                self.record_violation(violation).await;
            }
            SessionInput::ActivateCamera => self.activate_camera().await,
            SessionInput::End => self.end_requested(),
        }
    }

    async fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::Timer(TimerEvent::Tick { elapsed, remaining }) => {
                self.elapsed = elapsed;
                if let Err(e) = self.commands.try_send(Command::Tick { elapsed, remaining }) {
                    tracing::trace!("tick not delivered: {}", e);
                }
            }
            Internal::Timer(TimerEvent::LowTime { remaining }) => self.low_time(remaining).await,
            Internal::Timer(TimerEvent::Expired) => self.time_expired(),
            Internal::Relay(RelayEvent::Alert(event)) => self.on_alert(event).await,
            Internal::Relay(RelayEvent::ChannelLost) => self.send(Command::ProctoringLost).await,
            Internal::Heard { generation, result } => self.on_heard(generation, result).await,
            Internal::CameraAcquired(acquired) => self.on_camera(acquired).await,
            Internal::TurnResolved { ticket, result } => self.on_turn_resolved(ticket, result).await,
            Internal::ViolationReported(result) => self.on_violation_reported(result),
        }
    }

    async fn low_time(&mut self, remaining: u64) {
        if self.low_time_sent {
            return;
        }
        self.low_time_sent = true;
        self.send(Command::LowTime { remaining }).await;
    }

    fn time_expired(&mut self) {
        if self.termination_reason.is_some() {
            return;
        }
        self.termination_reason = Some(TerminationReason::TimeExpired);
        self.elapsed = self.context.duration_secs;
        self.stop_listening();
        tracing::info!("time expired; sending the closing exchange");

        match self.turn.submit_time_expired(self.context.duration_secs) {
            Some(submission) => self.dispatch(submission),
            None => {
                self.turn.finish();
            }
        }
    }

    async fn submit_answer(&mut self, text: &str) {
        match self.turn.submit_answer(text, self.elapsed) {
            Ok(submission) => {
                self.stop_listening();
                self.dispatch(submission);
                self.send_transcript().await;
            }
            Err(e) => tracing::debug!("answer not accepted: {}", e),
        }
    }

    fn dispatch(&self, submission: Submission) {
        let backend = self.backend.clone();
        let tx = self.internal_tx.clone();
        let grace = match submission.kind {
            SubmissionKind::Closing => Some(self.context.settings.closing_grace),
            SubmissionKind::Answer => None,
        };
        let ticket = submission.ticket;
        tokio::spawn(async move {
            let call = backend.submit_answer(submission.request);
            let result = match grace {
                Some(grace) => match tokio::time::timeout(grace, call).await {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::Timeout),
                },
                None => call.await,
            };
            let result = result.map_err(|e| e.to_string());
            if tx.send(Internal::TurnResolved { ticket, result }).await.is_err() {
                tracing::debug!("session ended before {:?} resolved", ticket);
            }
        });
    }

    async fn on_turn_resolved(&mut self, ticket: Ticket, result: Result<ChatResponse, String>) {
        match self.turn.resolve(ticket, result) {
            TurnOutcome::NextQuestion {
                question,
                round,
                audio_url,
                time_warning,
            } => {
                if time_warning {
                    self.low_time(self.remaining()).await;
                }
                self.send(Command::AskQuestion {
                    text: question,
                    round,
                    audio_url,
                })
                .await;
            }
            TurnOutcome::Finished { closing, audio_url } => {
                if let Some(text) = closing {
                    self.send(Command::Closing { text, audio_url }).await;
                }
            }
            TurnOutcome::Failed { error } => {
                self.send(Command::RecoverableError(format!(
                    "Failed to send your answer: {error}"
                )))
                .await;
            }
            TurnOutcome::Stale => {
                tracing::debug!("late response recorded without effect");
            }
        }
        self.send_transcript().await;
    }

    async fn start_listening(&mut self) {
        if self.turn.phase() != Phase::Interviewing {
            tracing::debug!("not listening while {:?}", self.turn.phase());
            return;
        }
        if self.listening.is_some() {
            return;
        }
        let Some(recognizer) = self.recognizer.clone() else {
            self.send(Command::CaptureUnavailable(
                CaptureError::SpeechUnsupported.to_string(),
            ))
            .await;
            return;
        };

        self.listen_generation += 1;
        let generation = self.listen_generation;
        let token = CancellationToken::new();
        self.listening = Some((generation, token.clone()));

        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = recognizer.listen() => result,
            };
            if tx.send(Internal::Heard { generation, result }).await.is_err() {
                tracing::debug!("session ended while listening");
            }
        });
        self.send(Command::Listening).await;
    }

    fn stop_listening(&mut self) {
        if let Some((_, token)) = self.listening.take() {
            token.cancel();
        }
    }

    async fn on_heard(&mut self, generation: u64, result: Result<String, CaptureError>) {
        let current = self.listening.as_ref().map(|(g, _)| *g);
        if current != Some(generation) {
            return;
        }
        self.listening = None;
        match result {
            Ok(text) => self.submit_answer(&text).await,
            Err(e) => {
                tracing::warn!("speech capture failed: {}", e);
                self.send(Command::CaptureUnavailable(e.to_string())).await;
            }
        }
    }

    async fn activate_camera(&mut self) {
        if self.camera.is_active() || self.camera.pending {
            return;
        }
        let Some(provider) = self.camera_provider.clone() else {
            self.send(Command::CaptureUnavailable(
                CaptureError::CameraNotFound.to_string(),
            ))
            .await;
            return;
        };

        self.camera.pending = true;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let acquired = provider.acquire().await;
            if let Err(mpsc::error::SendError(Internal::CameraAcquired(Ok(device)))) =
                tx.send(Internal::CameraAcquired(acquired)).await
            {
                device.release();
            }
        });
    }

    async fn on_camera(&mut self, acquired: Result<Arc<dyn CaptureDevice>, CaptureError>) {
        match acquired {
            Ok(device) => {
                let name = device.name().to_string();
                if self.camera.install(device) {
                    tracing::info!("camera active: {}", name);
                    self.send(Command::CameraActive).await;
                }
            }
            Err(e) => {
                self.camera.pending = false;
                tracing::warn!("camera unavailable: {}", e);
                self.send(Command::CaptureUnavailable(e.to_string())).await;
            }
        }
    }

    async fn on_alert(&mut self, event: AlertEvent) {
        let alert = event.alert();
        if alert != self.alert {
            self.alert = alert;
            self.send(Command::AlertChanged(alert)).await;
        }
        if event.terminate() {
            tracing::warn!("proctor ordered termination");
            self.terminate(TerminationReason::ViolationThreshold);
            return;
        }
        if let Some(violation) = ViolationEvent::camera(alert, Instant::now()) {
            self.record_violation(violation).await;
        }
    }

    async fn record_violation(&mut self, violation: ViolationEvent) {
        let source = violation.source();
        let outcome = if self.termination_reason == Some(TerminationReason::TimeExpired) {
            self.violations.record_without_termination(&violation)
        } else {
            self.violations.record(&violation)
        };
        match outcome {
            ViolationOutcome::Collapsed => {}
            ViolationOutcome::Warning { count, message } => {
                self.report_violation();
                self.send(Command::Warning {
                    source,
                    count,
                    message,
                })
                .await;
            }
            ViolationOutcome::Terminate { count, message } => {
                self.report_violation();
                self.send(Command::Warning {
                    source,
                    count,
                    message,
                })
                .await;
                self.terminate(TerminationReason::ViolationThreshold);
            }
        }
    }

    fn report_violation(&self) {
        let backend = self.backend.clone();
        let tx = self.internal_tx.clone();
        let interview_id = self.context.interview_id.clone();
        tokio::spawn(async move {
            let result = backend
                .report_violation(interview_id)
                .await
                .map_err(|e| e.to_string());
            if tx.send(Internal::ViolationReported(result)).await.is_err() {
                tracing::debug!("session ended before the violation report returned");
            }
        });
    }

    fn on_violation_reported(&mut self, result: Result<WarningResponse, String>) {
        match result {
            Ok(response) => {
                tracing::debug!("backend counts {} warnings", response.warning_count());
                if response.terminate() {
                    tracing::warn!("backend ordered termination");
                    self.terminate(TerminationReason::ViolationThreshold);
                }
            }
            Err(e) => tracing::warn!("violation report failed: {}", e),
        }
    }

    fn end_requested(&mut self) {
        if self.termination_reason == Some(TerminationReason::TimeExpired) {
            // Already closing; stop waiting for the closing remark.
            self.turn.finish();
            return;
        }
        self.terminate(TerminationReason::Manual);
    }

    fn terminate(&mut self, reason: TerminationReason) {
        if self.turn.phase().is_terminal() {
            return;
        }
        if self.termination_reason == Some(TerminationReason::TimeExpired) {
            tracing::info!("ignoring {:?} during the closing exchange", reason);
            return;
        }
        self.termination_reason = Some(reason);
        self.turn.terminate();
        tracing::warn!("interview terminated: {:?}", reason);
    }

    /// Stops everything the session started. Runs once.
    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stop_listening();
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        // Closing first unblocks any task waiting to report back.
        self.internal_rx.close();
        if let Some(relay) = self.relay.take() {
            let stats = relay.shutdown().await;
            tracing::debug!("relay stats: {:?}", stats);
        }
        self.camera.release();
        while let Ok(event) = self.internal_rx.try_recv() {
            if let Internal::CameraAcquired(Ok(device)) = event {
                device.release();
            }
        }
    }

    async fn send_transcript(&self) {
        let window: Vec<TranscriptEntry> = self
            .turn
            .transcript()
            .recent(self.context.settings.transcript_window)
            .to_vec();
        self.send(Command::Transcript(window)).await;
    }

    async fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command).await {
            tracing::warn!("failed to deliver command: {}", e);
        }
    }

    fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            interview_id: self.context.interview_id.clone(),
            phase: self.turn.phase(),
            termination_reason: self.termination_reason,
            round: self.turn.round(),
            violation_count: self.violations.count(),
            elapsed_seconds: self.elapsed,
            duration_seconds: self.context.duration_secs,
            transcript: self.turn.transcript().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockInterviewBackend;
    use crate::testing::{FakeLink, ScriptedBackend, SharedCamera};
    use crate::turn::TIME_EXPIRED_ANSWER;
    use crate::violation::ViolationSource;
    use interview_capture::ChannelRecognizer;
    use interview_types::Role;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    fn opening() -> StartResponse {
        StartResponse::new("Tell me about yourself.")
    }

    fn new_session(
        backend: Arc<dyn InterviewBackend>,
        minutes: u32,
    ) -> (InterviewSession, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(256);
        let context = SessionContext::new(InterviewId::new("42"), minutes);
        (InterviewSession::new(context, backend, &opening(), tx), rx)
    }

    /// A session running in the background plus everything it said so far.
    struct Running {
        inputs: mpsc::Sender<SessionInput>,
        commands: mpsc::Receiver<Command>,
        log: Vec<Command>,
        task: JoinHandle<SessionOutcome>,
    }

    impl Running {
        fn spawn(session: InterviewSession, commands: mpsc::Receiver<Command>) -> Self {
            let (inputs, inputs_rx) = mpsc::channel(64);
            let task = tokio::spawn(session.run(inputs_rx));
            Self {
                inputs,
                commands,
                log: Vec::new(),
                task,
            }
        }

        async fn send(&self, input: SessionInput) {
            self.inputs.send(input).await.unwrap();
        }

        async fn wait_for(&mut self, wanted: impl Fn(&Command) -> bool) -> Command {
            loop {
                let command = self.commands.recv().await.expect("session went quiet");
                self.log.push(command.clone());
                if wanted(&command) {
                    return command;
                }
            }
        }

        async fn finish(mut self) -> (SessionOutcome, Vec<Command>) {
            self.wait_for(|c| matches!(c, Command::SessionEnded(_))).await;
            let outcome = self.task.await.unwrap();
            (outcome, self.log)
        }
    }

    fn is_question(command: &Command) -> bool {
        matches!(command, Command::AskQuestion { .. })
    }

    fn warnings(log: &[Command]) -> Vec<String> {
        log.iter()
            .filter_map(|c| match c {
                Command::Warning { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn five_answers_finish_the_interview() {
        let mut backend = MockInterviewBackend::new();
        let mut round = 1;
        backend.expect_submit_answer().times(5).returning(move |request| {
            assert_eq!(request.interview_id().as_str(), "42");
            round += 1;
            Ok(ChatResponse::new(&format!("Question {round}"), round).with_finished(round == 6))
        });
        let (session, commands) = new_session(Arc::new(backend), 5);
        let mut running = Running::spawn(session, commands);

        for i in 1..=5 {
            let asked = running.wait_for(is_question).await;
            assert!(matches!(asked, Command::AskQuestion { round, .. } if round == i));
            running.send(SessionInput::Answer(format!("answer {i}"))).await;
        }
        let (outcome, log) = running.finish().await;

        assert_eq!(outcome.phase, Phase::Finished);
        assert_eq!(outcome.termination_reason, None);
        assert_eq!(outcome.round, 5);
        assert_eq!(outcome.transcript.len(), 11);
        assert_eq!(outcome.transcript.count(Role::User), 5);
        assert!(log.iter().any(|c| matches!(c, Command::Closing { text, .. } if text == "Question 6")));
    }

    #[tokio::test(start_paused = true)]
    async fn three_spaced_tab_switches_terminate() {
        let backend = Arc::new(ScriptedBackend::new());
        let (session, commands) = new_session(backend.clone(), 10);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        for _ in 0..3 {
            running.send(SessionInput::FocusLost(FocusSignal::TabHidden)).await;
            tokio::time::sleep(Duration::from_secs(4)).await;
        }
        let (outcome, log) = running.finish().await;

        assert_eq!(outcome.phase, Phase::Terminated);
        assert_eq!(
            outcome.termination_reason,
            Some(TerminationReason::ViolationThreshold)
        );
        assert_eq!(outcome.violation_count, 3);
        assert_eq!(
            warnings(&log),
            vec![
                "Warning 1/3: Tab switching is not allowed!",
                "Warning 2/3: One more violation = termination!",
                "Interview terminated — tab switching violations!",
            ]
        );
        assert!(backend.answers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn blur_right_after_hidden_counts_once() {
        let backend = Arc::new(ScriptedBackend::new());
        let (session, commands) = new_session(backend.clone(), 10);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::FocusLost(FocusSignal::TabHidden)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        running.send(SessionInput::FocusLost(FocusSignal::WindowBlur)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        running.send(SessionInput::End).await;
        let (outcome, _) = running.finish().await;

        assert_eq!(outcome.violation_count, 1);
        assert_eq!(outcome.termination_reason, Some(TerminationReason::Manual));
        assert_eq!(backend.reports(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_answer_while_awaiting_is_ignored() {
        let mut scripted = ScriptedBackend::new();
        scripted.answer_delay = Duration::from_secs(2);
        let backend = Arc::new(scripted);
        let (session, commands) = new_session(backend.clone(), 10);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::Answer("first".to_string())).await;
        running.send(SessionInput::Answer("second".to_string())).await;
        let next = running.wait_for(is_question).await;
        assert!(matches!(next, Command::AskQuestion { round: 2, .. }));
        running.send(SessionInput::End).await;
        let (outcome, _) = running.finish().await;

        assert_eq!(backend.answers(), vec!["first"]);
        let users: Vec<_> = outcome
            .transcript
            .entries()
            .iter()
            .filter(|e| e.role() == Role::User)
            .map(|e| e.text().to_string())
            .collect();
        assert_eq!(users, vec!["first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_supersedes_answer_in_flight() {
        let mut scripted = ScriptedBackend::new();
        scripted.answer_delay = Duration::from_secs(30);
        let backend = Arc::new(scripted);
        let (session, commands) = new_session(backend.clone(), 1);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        tokio::time::sleep(Duration::from_secs(50)).await;
        running.send(SessionInput::Answer("slow answer".to_string())).await;
        let (outcome, log) = running.finish().await;

        assert_eq!(outcome.phase, Phase::Finished);
        assert_eq!(outcome.termination_reason, Some(TerminationReason::TimeExpired));
        assert_eq!(outcome.round, 1);
        assert_eq!(outcome.elapsed_seconds, 60);
        let texts: Vec<_> = outcome.transcript.entries().iter().map(|e| e.text()).collect();
        assert_eq!(
            texts,
            vec![
                "Tell me about yourself.",
                "slow answer",
                TIME_EXPIRED_ANSWER,
                "Time is up! Thank you.",
            ]
        );
        assert_eq!(
            log.iter().filter(|c| matches!(c, Command::LowTime { .. })).count(),
            1
        );
        assert!(log.iter().any(|c| matches!(c, Command::Closing { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn closing_exchange_is_bounded_by_grace() {
        let mut scripted = ScriptedBackend::new();
        scripted.closing_delay = Duration::from_secs(60);
        let (session, commands) = new_session(Arc::new(scripted), 1);
        let started = Instant::now();
        let running = Running::spawn(session, commands);
        let (outcome, log) = running.finish().await;

        assert_eq!(outcome.phase, Phase::Finished);
        assert_eq!(outcome.termination_reason, Some(TerminationReason::TimeExpired));
        assert!(started.elapsed() < Duration::from_secs(75));
        assert!(!log.iter().any(|c| matches!(c, Command::Closing { .. })));
        assert_eq!(outcome.transcript.last().unwrap().text(), TIME_EXPIRED_ANSWER);
    }

    #[tokio::test(start_paused = true)]
    async fn violations_during_closing_cannot_terminate() {
        let mut scripted = ScriptedBackend::new();
        scripted.closing_delay = Duration::from_secs(5);
        let (session, commands) = new_session(Arc::new(scripted), 1);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        running.send(SessionInput::FocusLost(FocusSignal::TabHidden)).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        running.send(SessionInput::FocusLost(FocusSignal::TabHidden)).await;
        running
            .wait_for(|c| matches!(c, Command::Tick { remaining: 0, .. }))
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        running.send(SessionInput::FocusLost(FocusSignal::WindowBlur)).await;
        let (outcome, log) = running.finish().await;

        assert_eq!(outcome.violation_count, 3);
        assert_eq!(outcome.phase, Phase::Finished);
        assert_eq!(outcome.termination_reason, Some(TerminationReason::TimeExpired));
        assert_eq!(
            warnings(&log),
            vec![
                "Warning 1/3: Tab switching is not allowed!",
                "Warning 2/3: One more violation = termination!",
                "Warning 3/3: Tab switching is not allowed!",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn time_warning_and_timer_share_one_low_time_notice() {
        let mut backend = MockInterviewBackend::new();
        backend
            .expect_submit_answer()
            .times(1)
            .returning(|_| Ok(ChatResponse::new("How do you test async code?", 2).with_time_warning(true)));
        let (session, commands) = new_session(Arc::new(backend), 5);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::Answer("With a paused clock.".to_string())).await;
        let notice = running
            .wait_for(|c| matches!(c, Command::LowTime { .. }))
            .await;
        assert!(matches!(notice, Command::LowTime { remaining } if remaining > 60));
        running
            .wait_for(|c| matches!(c, Command::Tick { remaining, .. } if *remaining <= 50))
            .await;
        running.send(SessionInput::End).await;
        let (outcome, log) = running.finish().await;

        assert_eq!(outcome.round, 2);
        assert_eq!(
            log.iter().filter(|c| matches!(c, Command::LowTime { .. })).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn finished_opening_ends_without_asking() {
        let (verdicts, link) = FakeLink::new();
        let closed = link.closed();
        let opening: StartResponse = serde_json::from_value(serde_json::json!({
            "question": "This interview has already been completed.",
            "is_finished": true,
        }))
        .unwrap();
        let (tx, commands) = mpsc::channel(16);
        let context = SessionContext::new(InterviewId::new("42"), 10);
        let session = InterviewSession::new(context, Arc::new(ScriptedBackend::new()), &opening, tx)
            .with_proctor_link(link);
        let (outcome, log) = Running::spawn(session, commands).finish().await;

        assert_eq!(outcome.phase, Phase::Finished);
        assert_eq!(outcome.termination_reason, None);
        assert!(!log.iter().any(is_question));
        assert!(log.iter().any(|c| matches!(c, Command::Closing { .. })));
        assert!(closed.load(Ordering::SeqCst));
        drop(verdicts);
    }

    #[tokio::test(start_paused = true)]
    async fn proctor_terminate_flag_ends_without_counting() {
        let (verdicts, link) = FakeLink::new();
        let closed = link.closed();
        let (session, commands) = new_session(Arc::new(ScriptedBackend::new()), 10);
        let mut running = Running::spawn(session.with_proctor_link(link), commands);
        running.wait_for(is_question).await;

        verdicts
            .send(AlertEvent::new(Alert::Ok).with_terminate(true))
            .await
            .unwrap();
        let (outcome, _) = running.finish().await;

        assert_eq!(outcome.phase, Phase::Terminated);
        assert_eq!(
            outcome.termination_reason,
            Some(TerminationReason::ViolationThreshold)
        );
        assert_eq!(outcome.violation_count, 0);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn camera_alerts_count_and_camera_is_released() {
        let (verdicts, link) = FakeLink::new();
        let sent = link.sent();
        let provider = SharedCamera::new();
        let camera = provider.0.clone();
        let backend = Arc::new(ScriptedBackend::new());
        let (session, commands) = new_session(backend.clone(), 10);
        let session = session
            .with_proctor_link(link)
            .with_camera(Arc::new(provider));
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::ActivateCamera).await;
        running.wait_for(|c| matches!(c, Command::CameraActive)).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!sent.lock().unwrap().is_empty());

        for _ in 0..3 {
            verdicts.send(AlertEvent::new(Alert::NoFace)).await.unwrap();
        }
        let (outcome, log) = running.finish().await;

        assert_eq!(outcome.violation_count, 3);
        assert_eq!(outcome.phase, Phase::Terminated);
        assert!(camera.is_released());
        assert_eq!(
            log.iter()
                .filter(|c| matches!(c, Command::AlertChanged(Alert::NoFace)))
                .count(),
            1
        );
        assert!(log.iter().all(|c| match c {
            Command::Warning { source, .. } => *source == ViolationSource::RemoteClassification,
            _ => true,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn backend_can_order_termination_on_report() {
        let mut scripted = ScriptedBackend::new();
        scripted.terminate_on_report = Some(1);
        let (session, commands) = new_session(Arc::new(scripted), 10);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::FocusLost(FocusSignal::WindowBlur)).await;
        let (outcome, _) = running.finish().await;

        assert_eq!(outcome.violation_count, 1);
        assert_eq!(
            outcome.termination_reason,
            Some(TerminationReason::ViolationThreshold)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn spoken_answer_is_submitted() {
        let (speech, recognizer) = ChannelRecognizer::new(4);
        let backend = Arc::new(ScriptedBackend::new());
        let (session, commands) = new_session(backend.clone(), 10);
        let mut running = Running::spawn(session.with_recognizer(Arc::new(recognizer)), commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::StartListening).await;
        running.wait_for(|c| matches!(c, Command::Listening)).await;
        speech.send("I profile before optimizing.".to_string()).await.unwrap();
        running.wait_for(is_question).await;
        running.send(SessionInput::End).await;
        running.finish().await;

        assert_eq!(backend.answers(), vec!["I profile before optimizing."]);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_cancels_pending_speech() {
        let (speech, recognizer) = ChannelRecognizer::new(4);
        let backend = Arc::new(ScriptedBackend::new());
        let (session, commands) = new_session(backend.clone(), 1);
        let mut running = Running::spawn(session.with_recognizer(Arc::new(recognizer)), commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::StartListening).await;
        let (outcome, _) = running.finish().await;
        drop(speech);

        assert_eq!(backend.answers(), vec![TIME_EXPIRED_ANSWER]);
        assert_eq!(outcome.phase, Phase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_recognizer_is_reported_not_fatal() {
        let (session, commands) = new_session(Arc::new(ScriptedBackend::new()), 10);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::StartListening).await;
        let unavailable = running
            .wait_for(|c| matches!(c, Command::CaptureUnavailable(_)))
            .await;
        assert!(
            matches!(unavailable, Command::CaptureUnavailable(m) if m == "Speech recognition not supported.")
        );
        running.send(SessionInput::Answer("typed instead".to_string())).await;
        running.wait_for(is_question).await;
        running.send(SessionInput::End).await;
        let (outcome, _) = running.finish().await;
        assert_eq!(outcome.round, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_answer_can_be_retried() {
        let mut backend = MockInterviewBackend::new();
        let mut calls = 0;
        backend.expect_submit_answer().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(BackendError::Status {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok(ChatResponse::new("Next one.", 2))
            }
        });
        let (session, commands) = new_session(Arc::new(backend), 10);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        running.send(SessionInput::Answer("try".to_string())).await;
        running
            .wait_for(|c| matches!(c, Command::RecoverableError(_)))
            .await;
        running.send(SessionInput::Answer("try again".to_string())).await;
        let next = running.wait_for(is_question).await;
        assert!(matches!(next, Command::AskQuestion { round: 2, .. }));
        running.send(SessionInput::End).await;
        let (outcome, _) = running.finish().await;
        assert_eq!(outcome.transcript.count(Role::User), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_inputs_end_the_session() {
        let (session, commands) = new_session(Arc::new(ScriptedBackend::new()), 10);
        let mut running = Running::spawn(session, commands);
        running.wait_for(is_question).await;

        let (replacement, _) = mpsc::channel(1);
        drop(std::mem::replace(&mut running.inputs, replacement));
        let (outcome, _) = running.finish().await;

        assert_eq!(outcome.phase, Phase::Terminated);
        assert_eq!(outcome.termination_reason, Some(TerminationReason::Manual));
        assert_eq!(outcome.transcript.len(), 1);
    }
}
