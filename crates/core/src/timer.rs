use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { elapsed: u64, remaining: u64 },
    LowTime { remaining: u64 },
    Expired,
}

/// Second-granularity countdown, advanced by whoever owns the clock.
#[derive(Debug, Clone)]
pub struct Countdown {
    duration: u64,
    elapsed: u64,
    low_time_threshold: u64,
    low_time_sent: bool,
    expired: bool,
}

impl Countdown {
    pub fn new(duration_secs: u64, low_time_threshold: u64) -> Self {
        Self {
            duration: duration_secs,
            elapsed: 0,
            low_time_threshold,
            low_time_sent: false,
            expired: false,
        }
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn remaining(&self) -> u64 {
        self.duration.saturating_sub(self.elapsed)
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Advances one second and returns what that second produced, in order.
    ///
    /// After `Expired` nothing more is produced.
    pub fn advance(&mut self) -> Vec<TimerEvent> {
        if self.expired {
            return Vec::new();
        }
        self.elapsed += 1;
        let remaining = self.remaining();

        let mut events = vec![TimerEvent::Tick {
            elapsed: self.elapsed,
            remaining,
        }];
        if !self.low_time_sent && remaining > 0 && remaining <= self.low_time_threshold {
            self.low_time_sent = true;
            events.push(TimerEvent::LowTime { remaining });
        }
        if remaining == 0 {
            self.expired = true;
            events.push(TimerEvent::Expired);
        }
        events
    }
}

pub struct TimerHandle {
    cancel: CancellationToken,
}

impl TimerHandle {
    /// Stops the countdown. Events already queued are not recalled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Drives `countdown` once per second and forwards its events through `wrap`.
///
/// The task ends after `Expired`, when cancelled, or when the receiver is gone.
pub fn spawn_countdown<T: Send + 'static>(
    mut countdown: Countdown,
    tx: mpsc::Sender<T>,
    wrap: fn(TimerEvent) -> T,
) -> TimerHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }
            for event in countdown.advance() {
                if token.is_cancelled() {
                    break;
                }
                if tx.send(wrap(event)).await.is_err() {
                    tracing::debug!("countdown receiver dropped");
                    return;
                }
            }
            if countdown.is_expired() || token.is_cancelled() {
                break;
            }
        }
        tracing::debug!(
            "countdown stopped at {}s of {}s",
            countdown.elapsed(),
            countdown.duration()
        );
    });
    TimerHandle { cancel }
}

/// `mm:ss`, zero padded. Minutes are not wrapped into hours.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Share of the interview already spent, for progress displays.
pub fn elapsed_percent(elapsed: u64, duration: u64) -> f64 {
    if duration == 0 {
        return 100.0;
    }
    (elapsed.min(duration) as f64 / duration as f64) * 100.0
}
