use interview_types::Alert;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSource {
    /// The proctor classified a camera frame as a violation.
    RemoteClassification,
    /// The candidate's window lost focus or became hidden.
    FocusLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusSignal {
    TabHidden,
    WindowBlur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationCategory {
    Camera(Alert),
    Focus(FocusSignal),
}

/// A single observed violation. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationEvent {
    category: ViolationCategory,
    at: Instant,
}

impl ViolationEvent {
    /// `None` unless the alert is one of the violation categories.
    pub fn camera(alert: Alert, at: Instant) -> Option<Self> {
        alert.is_violation().then_some(Self {
            category: ViolationCategory::Camera(alert),
            at,
        })
    }

    pub fn focus_loss(signal: FocusSignal, at: Instant) -> Self {
        Self {
            category: ViolationCategory::Focus(signal),
            at,
        }
    }

    pub fn source(&self) -> ViolationSource {
        match self.category {
            ViolationCategory::Camera(_) => ViolationSource::RemoteClassification,
            ViolationCategory::Focus(_) => ViolationSource::FocusLoss,
        }
    }

    pub fn category(&self) -> ViolationCategory {
        self.category
    }

    pub fn at(&self) -> Instant {
        self.at
    }
}

/// Collapses bursts of focus-loss signals into one counted violation.
///
/// Tab-hidden and window-blur share the window: switching tabs usually fires
/// both.
#[derive(Debug, Clone)]
pub struct DebouncePolicy {
    window: Duration,
    last_counted: Option<Instant>,
}

impl DebouncePolicy {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_counted: None,
        }
    }

    pub fn should_collapse(&self, now: Instant, last: Instant) -> bool {
        now.saturating_duration_since(last) < self.window
    }

    /// True if a signal at `now` counts. The window restarts only on counted
    /// signals.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_counted {
            if self.should_collapse(now, last) {
                return false;
            }
        }
        self.last_counted = Some(now);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Absorbed by the debounce window; the count did not move.
    Collapsed,
    Warning { count: u32, message: String },
    /// The threshold was reached with this violation.
    Terminate { count: u32, message: String },
}

/// Counts violations across all sources toward one termination threshold.
#[derive(Debug, Clone)]
pub struct ViolationTracker {
    count: u32,
    threshold: u32,
    focus_debounce: DebouncePolicy,
}

impl ViolationTracker {
    pub fn new(threshold: u32, focus_debounce: Duration) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
            focus_debounce: DebouncePolicy::new(focus_debounce),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record(&mut self, event: &ViolationEvent) -> ViolationOutcome {
        self.count_violation(event, true)
    }

    /// Counts like [`record`](Self::record) but never reaches termination.
    /// Used once the interview is already closing on its own.
    pub fn record_without_termination(&mut self, event: &ViolationEvent) -> ViolationOutcome {
        self.count_violation(event, false)
    }

    fn count_violation(&mut self, event: &ViolationEvent, may_terminate: bool) -> ViolationOutcome {
        if event.source() == ViolationSource::FocusLoss && !self.focus_debounce.admit(event.at()) {
            tracing::debug!("focus loss collapsed into the previous one: {:?}", event.category());
            return ViolationOutcome::Collapsed;
        }

        self.count += 1;
        let severity = if !may_terminate {
            Severity::Warning
        } else if self.count >= self.threshold {
            Severity::Final
        } else if self.count + 1 == self.threshold {
            Severity::LastChance
        } else {
            Severity::Warning
        };
        let message = warning_copy(event.source(), severity, self.count, self.threshold);
        tracing::info!(
            "violation {}/{} recorded: {:?}",
            self.count,
            self.threshold,
            event.category()
        );
        if severity == Severity::Final {
            ViolationOutcome::Terminate {
                count: self.count,
                message,
            }
        } else {
            ViolationOutcome::Warning {
                count: self.count,
                message,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Warning,
    LastChance,
    Final,
}

fn warning_copy(source: ViolationSource, severity: Severity, count: u32, threshold: u32) -> String {
    match (source, severity) {
        (ViolationSource::FocusLoss, Severity::Final) => {
            "Interview terminated — tab switching violations!".to_string()
        }
        (ViolationSource::FocusLoss, Severity::LastChance) => {
            format!("Warning {count}/{threshold}: One more violation = termination!")
        }
        (ViolationSource::FocusLoss, Severity::Warning) => {
            format!("Warning {count}/{threshold}: Tab switching is not allowed!")
        }
        (ViolationSource::RemoteClassification, Severity::Final) => {
            "Interview terminated — proctoring violations!".to_string()
        }
        (ViolationSource::RemoteClassification, Severity::LastChance) => {
            format!("Warning {count}/{threshold}: Last warning before termination!")
        }
        (ViolationSource::RemoteClassification, Severity::Warning) => {
            format!("Warning {count}/{threshold}: Sit straight, face the camera!")
        }
    }
}
