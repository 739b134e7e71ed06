#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    frames_sent: u64,
    send_failures: u64,
    alerts_received: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub(crate) fn record_send_failure(&mut self) {
        self.send_failures += 1;
    }

    pub(crate) fn record_alert(&mut self) {
        self.alerts_received += 1;
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures
    }

    pub fn alerts_received(&self) -> u64 {
        self.alerts_received
    }
}
