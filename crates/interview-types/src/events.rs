pub mod client;
pub mod server;

pub use client::FrameEvent;
pub use server::AlertEvent;

/// Outbound messages on the proctoring channel.
///
/// The proctor expects bare objects without a type tag, so the variants are
/// serialized untagged.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ClientEvent {
    Frame(FrameEvent),
}

/// Inbound events surfaced by the proctoring channel reader.
///
/// `Alert` is decoded from the wire. `Close` is synthesized locally when the
/// socket closes or fails so subscribers see a single end-of-stream marker.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Alert(AlertEvent),
    Close { reason: Option<String> },
}
