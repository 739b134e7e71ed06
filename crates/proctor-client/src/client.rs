use crate::types::events::{AlertEvent, FrameEvent};
use crate::types::{ClientEvent, ServerEvent};
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

mod config;
mod consts;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use stats::Stats;

pub type ClientTx = tokio::sync::mpsc::Sender<ClientEvent>;
type ServerRx = tokio::sync::broadcast::Receiver<ServerEvent>;

// Holds the channel capacity, the outbound sender and inbound receiver, the
// connection flag shared with the socket tasks, and stats guarded by a Mutex.
pub struct Client {
    capacity: usize,
    config: Config,
    c_tx: Option<ClientTx>,
    // Subscribed before the reader starts so nothing sent early is missed.
    s_rx: Option<ServerRx>,
    open: Arc<AtomicBool>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_rx: None,
            open: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!("proctoring channel connected: {}", self.config.url());

        // Split the WebSocket into read and write halves.
        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<ClientEvent>(self.capacity);
        let (s_tx, s_rx) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_rx = Some(s_rx);
        self.open.store(true, Ordering::SeqCst);

        // Writer: drains outbound events until every sender is dropped, then
        // closes the socket.
        let open = self.open.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            while let Some(event) = c_rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                        continue;
                    }
                };
                match write.send(Message::Text(text)).await {
                    Ok(()) => {
                        if let Ok(mut stats_guard) = stats.lock() {
                            stats_guard.record_sent();
                        }
                    }
                    Err(e) => {
                        tracing::warn!("failed to send frame: {}", e);
                        if let Ok(mut stats_guard) = stats.lock() {
                            stats_guard.record_send_failure();
                        }
                        open.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
            open.store(false, Ordering::SeqCst);
            if let Err(e) = write.send(Message::Close(None)).await {
                tracing::debug!("close frame not delivered: {}", e);
            }
            tracing::debug!("proctoring writer stopped");
        });

        // Reader: decodes proctor messages and broadcasts them. Ends with
        // exactly one `Close` event whatever the cause.
        let open = self.open.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            let mut reason = None;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::warn!("proctoring channel error: {}", e);
                        reason = Some(e.to_string());
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<AlertEvent>(&text) {
                        Ok(event) => {
                            if let Ok(mut stats_guard) = stats.lock() {
                                stats_guard.record_alert();
                            }
                            tracing::debug!(
                                "received alert: {:?}, terminate={}",
                                event.alert(),
                                event.terminate()
                            );
                            if s_tx.send(ServerEvent::Alert(event)).is_err() {
                                tracing::debug!("no subscribers for proctor alert");
                            }
                        }
                        Err(e) => {
                            tracing::warn!("failed to deserialize alert: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(frame) => {
                        tracing::info!("proctoring channel closed: {:?}", frame);
                        reason = frame.map(|f| f.reason.to_string());
                        break;
                    }
                    _ => {}
                }
            }
            open.store(false, Ordering::SeqCst);
            if s_tx.send(ServerEvent::Close { reason }).is_err() {
                tracing::debug!("no subscribers for close event");
            }
        });
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True while both socket halves are believed healthy.
    pub fn is_open(&self) -> bool {
        self.c_tx.is_some() && self.open.load(Ordering::SeqCst)
    }

    /// Waits for the next alert on the primary receiver.
    ///
    /// Returns `None` once the channel has closed. Lagged messages are skipped.
    pub async fn next_alert(&mut self) -> Option<AlertEvent> {
        let rx = self.s_rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(ServerEvent::Alert(event)) => return Some(event),
                Ok(ServerEvent::Close { reason }) => {
                    tracing::info!("proctoring channel ended: {:?}", reason);
                    self.s_rx = None;
                    return None;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("dropped {} proctor alerts", skipped);
                }
                Err(RecvError::Closed) => {
                    self.s_rx = None;
                    return None;
                }
            }
        }
    }

    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }

    /// Queues one encoded frame. Never waits: a full queue drops the frame.
    pub fn send_frame(&self, image: String) -> Result<()> {
        let event = ClientEvent::Frame(FrameEvent::new(image));
        match self.c_tx {
            Some(ref tx) => match tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(anyhow::anyhow!("outbound queue full")),
                Err(TrySendError::Closed(_)) => Err(anyhow::anyhow!("channel closed")),
            },
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// Closes the channel. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.c_tx.take().is_some() {
            tracing::info!("closing proctoring channel");
        }
        self.open.store(false, Ordering::SeqCst);
    }
}

// Connects to the proctor with an explicit configuration.
pub async fn connect_with_config(capacity: usize, config: Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

// Connects using the environment defaults.
pub async fn connect() -> Result<Client> {
    connect_with_config(consts::DEFAULT_CAPACITY, Config::new()).await
}
