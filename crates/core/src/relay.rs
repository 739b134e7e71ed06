use async_trait::async_trait;
use interview_capture::{CaptureDevice, frame};
use interview_types::events::AlertEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// The camera currently held by the session, if any.
pub type CameraWatch = watch::Receiver<Option<Arc<dyn CaptureDevice>>>;

/// A bidirectional channel to the remote proctor.
#[async_trait]
pub trait ProctorLink: Send + Sync {
    fn is_open(&self) -> bool;

    /// Queues one frame. Must not wait on the network.
    fn send_frame(&mut self, image: String) -> anyhow::Result<()>;

    /// Next classification; `None` once the channel is gone for good.
    async fn next_alert(&mut self) -> Option<AlertEvent>;

    fn close(&mut self);
}

#[async_trait]
impl ProctorLink for proctor_client::Client {
    fn is_open(&self) -> bool {
        proctor_client::Client::is_open(self)
    }

    fn send_frame(&mut self, image: String) -> anyhow::Result<()> {
        proctor_client::Client::send_frame(self, image)
    }

    async fn next_alert(&mut self) -> Option<AlertEvent> {
        proctor_client::Client::next_alert(self).await
    }

    fn close(&mut self) {
        proctor_client::Client::close(self)
    }
}

#[async_trait]
impl<L: ProctorLink + ?Sized> ProctorLink for Box<L> {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send_frame(&mut self, image: String) -> anyhow::Result<()> {
        (**self).send_frame(image)
    }

    async fn next_alert(&mut self) -> Option<AlertEvent> {
        (**self).next_alert().await
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Alert(AlertEvent),
    /// The proctor channel closed or failed. Sent once.
    ChannelLost,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub frames_sent: u64,
    pub frames_skipped: u64,
    pub alerts_received: u64,
}

pub struct RelayHandle {
    cancel: CancellationToken,
    task: JoinHandle<RelayStats>,
}

impl RelayHandle {
    /// Stops sampling, closes the link, and waits for the relay to wind down.
    pub async fn shutdown(self) -> RelayStats {
        self.cancel.cancel();
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("frame relay task failed: {}", e);
                RelayStats::default()
            }
        }
    }
}

enum Step {
    Stop,
    Sample,
    Inbound(Option<AlertEvent>),
}

/// Samples the camera every `period` and forwards proctor verdicts.
///
/// Frames are only sent while a ready camera is present and the link is open;
/// otherwise the tick is skipped. Sampling never blocks on delivery.
pub fn spawn_relay<L, T>(
    mut link: L,
    camera: CameraWatch,
    period: Duration,
    tx: mpsc::Sender<T>,
    wrap: fn(RelayEvent) -> T,
) -> RelayHandle
where
    L: ProctorLink + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = RelayStats::default();
        let mut inbound_open = true;

        loop {
            let step = tokio::select! {
                biased;
                _ = token.cancelled() => Step::Stop,
                alert = link.next_alert(), if inbound_open => Step::Inbound(alert),
                _ = interval.tick() => Step::Sample,
            };
            match step {
                Step::Stop => break,
                Step::Sample => sample(&mut link, &camera, &mut stats),
                Step::Inbound(Some(event)) => {
                    stats.alerts_received += 1;
                    if tx.send(wrap(RelayEvent::Alert(event))).await.is_err() {
                        break;
                    }
                }
                Step::Inbound(None) => {
                    inbound_open = false;
                    tracing::warn!("proctoring channel lost; continuing without classification");
                    if tx.send(wrap(RelayEvent::ChannelLost)).await.is_err() {
                        break;
                    }
                }
            }
        }

        link.close();
        tracing::info!(
            "frame relay stopped: sent={}, skipped={}, alerts={}",
            stats.frames_sent,
            stats.frames_skipped,
            stats.alerts_received
        );
        stats
    });
    RelayHandle { cancel, task }
}

fn sample<L: ProctorLink>(link: &mut L, camera: &CameraWatch, stats: &mut RelayStats) {
    let device = camera.borrow().clone();
    let Some(device) = device else {
        stats.frames_skipped += 1;
        return;
    };
    if !device.is_ready() || !link.is_open() {
        stats.frames_skipped += 1;
        return;
    }
    let Some(jpeg) = device.capture() else {
        stats.frames_skipped += 1;
        return;
    };
    match link.send_frame(frame::encode_data_url(&jpeg)) {
        Ok(()) => stats.frames_sent += 1,
        Err(e) => {
            tracing::debug!("frame dropped: {}", e);
            stats.frames_skipped += 1;
        }
    }
}
