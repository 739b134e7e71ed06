//! Test doubles shared by the session and relay tests.

use crate::backend::{BackendError, InterviewBackend, ResumeUpload};
use crate::relay::ProctorLink;
use crate::turn::TIME_EXPIRED_ANSWER;
use async_trait::async_trait;
use interview_capture::{CameraProvider, CaptureDevice, CaptureError, StillFrameCamera};
use interview_types::events::AlertEvent;
use interview_types::{
    ChatRequest, ChatResponse, EndResponse, InterviewId, SetupRequest, SetupResponse,
    StartResponse, WarningResponse,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];

/// Backend that answers from a script, with configurable latency.
pub(crate) struct ScriptedBackend {
    pub answer_delay: Duration,
    pub closing_delay: Duration,
    /// The violation report with this number orders termination.
    pub terminate_on_report: Option<usize>,
    answers: Mutex<Vec<String>>,
    reports: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            answer_delay: Duration::ZERO,
            closing_delay: Duration::ZERO,
            terminate_on_report: None,
            answers: Mutex::new(Vec::new()),
            reports: AtomicUsize::new(0),
        }
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().unwrap().clone()
    }

    pub fn reports(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InterviewBackend for ScriptedBackend {
    async fn setup(&self, _request: SetupRequest) -> Result<SetupResponse, BackendError> {
        Ok(SetupResponse::new(InterviewId::new("42")))
    }

    async fn start(
        &self,
        _interview_id: InterviewId,
        _resume: ResumeUpload,
    ) -> Result<StartResponse, BackendError> {
        Ok(StartResponse::new("Tell me about yourself."))
    }

    async fn submit_answer(&self, request: ChatRequest) -> Result<ChatResponse, BackendError> {
        let count = {
            let mut answers = self.answers.lock().unwrap();
            answers.push(request.user_answer().to_string());
            answers.len()
        };
        if request.user_answer() == TIME_EXPIRED_ANSWER {
            tokio::time::sleep(self.closing_delay).await;
            return Ok(ChatResponse::new("Time is up! Thank you.", count as u32).with_finished(true));
        }
        tokio::time::sleep(self.answer_delay).await;
        let round = count as u32 + 1;
        Ok(ChatResponse::new(&format!("Question {round}"), round))
    }

    async fn report_violation(
        &self,
        _interview_id: InterviewId,
    ) -> Result<WarningResponse, BackendError> {
        let n = self.reports.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(WarningResponse::new(n as u32, self.terminate_on_report == Some(n)))
    }

    async fn end(&self, _interview_id: InterviewId) -> Result<EndResponse, BackendError> {
        Ok(EndResponse::default())
    }
}

/// In-memory proctor link fed through a channel of verdicts.
pub(crate) struct FakeLink {
    open: bool,
    inbound: mpsc::Receiver<AlertEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl FakeLink {
    pub fn new() -> (mpsc::Sender<AlertEvent>, Self) {
        let (tx, inbound) = mpsc::channel(8);
        let link = Self {
            open: true,
            inbound,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };
        (tx, link)
    }

    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    pub fn closed(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl ProctorLink for FakeLink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn send_frame(&mut self, image: String) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(image);
        Ok(())
    }

    async fn next_alert(&mut self) -> Option<AlertEvent> {
        self.inbound.recv().await
    }

    fn close(&mut self) {
        self.open = false;
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out the same camera on every acquire so tests can inspect it.
pub(crate) struct SharedCamera(pub Arc<StillFrameCamera>);

impl SharedCamera {
    pub fn new() -> Self {
        Self(Arc::new(StillFrameCamera::new("test camera", JPEG.to_vec()).unwrap()))
    }
}

#[async_trait]
impl CameraProvider for SharedCamera {
    async fn acquire(&self) -> Result<Arc<dyn CaptureDevice>, CaptureError> {
        let device: Arc<dyn CaptureDevice> = self.0.clone();
        Ok(device)
    }
}
