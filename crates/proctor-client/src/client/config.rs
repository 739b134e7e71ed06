use crate::client::consts::{BASE_URL, PROCTOR_PATH, PROCTOR_WS_URL};
use interview_types::InterviewId;
use secrecy::SecretString;

pub struct Config {
    base_url: String,
    interview_id: Option<InterviewId>,
    token: Option<SecretString>,
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_interview_id(mut self, interview_id: &InterviewId) -> Self {
        self.config.interview_id = Some(interview_id.clone());
        self
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.config.token = Some(token);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    // Falls back to the local proctor when PROCTOR_WS_URL is unset.
    pub fn new() -> Self {
        Self {
            base_url: std::env::var(PROCTOR_WS_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| BASE_URL.to_string()),
            interview_id: None,
            token: None,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn interview_id(&self) -> Option<&InterviewId> {
        self.interview_id.as_ref()
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// `{base}/ws/proctor/{interview_id}`, or the bare proctor path when no
    /// interview is bound yet.
    pub fn url(&self) -> String {
        match &self.interview_id {
            Some(id) => format!("{}/{}/{}", self.base_url, PROCTOR_PATH, id),
            None => format!("{}/{}", self.base_url, PROCTOR_PATH),
        }
    }
}
