use std::time::Duration;

/// Tunables for one interview session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Cadence of frame sampling for the proctor.
    pub frame_interval: Duration,
    /// Focus-loss signals closer than this to the last counted one collapse.
    pub focus_debounce: Duration,
    /// The violation that reaches this count ends the session.
    pub violation_threshold: u32,
    /// Remaining seconds at which the low-time warning fires.
    pub low_time_threshold_secs: u64,
    /// How long the closing exchange after time expiry may take.
    pub closing_grace: Duration,
    /// Trailing transcript entries meant for display.
    pub transcript_window: usize,
    pub channel_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(1500),
            focus_debounce: Duration::from_millis(3000),
            violation_threshold: 3,
            low_time_threshold_secs: 60,
            closing_grace: Duration::from_secs(10),
            transcript_window: 6,
            channel_capacity: 64,
        }
    }
}
