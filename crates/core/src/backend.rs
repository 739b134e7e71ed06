use async_trait::async_trait;
use interview_types::interview::ALLOWED_DURATIONS;
use interview_types::{
    ChatRequest, ChatResponse, EndResponse, InterviewId, InterviewType, SetupRequest,
    SetupResponse, StartResponse, WarningResponse,
};
#[cfg(test)]
use mockall::automock;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(serde_json::Error),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Http(e)
        }
    }
}

/// Problems with the candidate's choices, caught before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("duration must be one of 5, 10, 15, 20, 30, 45 or 60 minutes (got {0})")]
    InvalidDuration(u32),
    #[error("{0}")]
    InvalidType(String),
    #[error("Please select at least one skill")]
    NoSkills,
}

/// Checks the candidate's choices and builds the setup request.
pub fn validate_setup<S: AsRef<str>>(
    duration_minutes: u32,
    interview_type: &str,
    skills: &[S],
) -> Result<SetupRequest, SetupError> {
    if !ALLOWED_DURATIONS.contains(&duration_minutes) {
        return Err(SetupError::InvalidDuration(duration_minutes));
    }
    let interview_type = interview_type
        .parse::<InterviewType>()
        .map_err(SetupError::InvalidType)?;
    let request = SetupRequest::new(duration_minutes, interview_type).with_skills(skills);
    if request.skills().is_empty() {
        return Err(SetupError::NoSkills);
    }
    Ok(request)
}

/// A resume PDF headed for the start endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl ResumeUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume.pdf".to_string());
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The interview backend as seen by a session.
///
/// Every call is a single request/response. Failures come back as values;
/// nothing here retries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InterviewBackend: Send + Sync {
    async fn setup(&self, request: SetupRequest) -> Result<SetupResponse, BackendError>;

    /// Uploads the resume and returns the opening question.
    async fn start(
        &self,
        interview_id: InterviewId,
        resume: ResumeUpload,
    ) -> Result<StartResponse, BackendError>;

    async fn submit_answer(&self, request: ChatRequest) -> Result<ChatResponse, BackendError>;

    /// Reports one counted violation. The response may order termination.
    async fn report_violation(
        &self,
        interview_id: InterviewId,
    ) -> Result<WarningResponse, BackendError>;

    async fn end(&self, interview_id: InterviewId) -> Result<EndResponse, BackendError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: SecretString, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/interview/{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(BackendError::Decode)
    }
}

#[async_trait]
impl InterviewBackend for HttpBackend {
    async fn setup(&self, request: SetupRequest) -> Result<SetupResponse, BackendError> {
        let response = self
            .client
            .post(self.url("setup"))
            .bearer_auth(self.token.expose_secret())
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn start(
        &self,
        interview_id: InterviewId,
        resume: ResumeUpload,
    ) -> Result<StartResponse, BackendError> {
        if resume.is_empty() {
            return Err(BackendError::InvalidRequest("resume is empty".to_string()));
        }
        let part = Part::bytes(resume.bytes)
            .file_name(resume.file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(&format!("start/{interview_id}")))
            .bearer_auth(self.token.expose_secret())
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn submit_answer(&self, request: ChatRequest) -> Result<ChatResponse, BackendError> {
        let response = self
            .client
            .post(self.url("chat"))
            .bearer_auth(self.token.expose_secret())
            .form(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn report_violation(
        &self,
        interview_id: InterviewId,
    ) -> Result<WarningResponse, BackendError> {
        let response = self
            .client
            .post(self.url(&format!("warning/{interview_id}")))
            .bearer_auth(self.token.expose_secret())
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn end(&self, interview_id: InterviewId) -> Result<EndResponse, BackendError> {
        let response = self
            .client
            .post(self.url(&format!("end/{interview_id}")))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        Self::decode(response).await
    }
}
