use crate::Alert;

/// Classification message pushed by the proctor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AlertEvent {
    alert: Alert,

    /// Set when the proctor wants the session ended right away.
    #[serde(default)]
    terminate: bool,
}

impl AlertEvent {
    pub fn new(alert: Alert) -> Self {
        Self {
            alert,
            terminate: false,
        }
    }

    pub fn with_terminate(mut self, terminate: bool) -> Self {
        self.terminate = terminate;
        self
    }

    pub fn alert(&self) -> Alert {
        self.alert
    }

    pub fn terminate(&self) -> bool {
        self.terminate
    }
}
