//! Transport collaborator traits.
//!
//! The channel handshake, frame decoding, and identity lookups all live on
//! the platform side of this boundary. The recorder only sees these traits:
//! a deployment embeds the crate and implements them against its real-time
//! communication stack. `SimTransport` is the in-process implementation used
//! by the dev server binary and the integration tests.

mod sim;

pub use sim::SimTransport;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::capture::CaptureEvent;
use crate::ids::{ChannelId, ParticipantId};

/// Kind of channel an identifier points at; only voice channels can be
/// recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
    Text,
}

/// Metadata for a channel, as known to the transport.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no channel found with that ID")]
    UnknownChannel,
    #[error("could not connect: {0}")]
    Connect(String),
}

/// Entry point into the platform's channel layer.
#[async_trait::async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Look up a channel by identifier.
    async fn channel_info(&self, channel: ChannelId) -> Result<ChannelInfo, TransportError>;

    /// Establish a voice connection to the channel.
    async fn connect(&self, channel: ChannelId) -> Result<Box<dyn VoiceConnection>, TransportError>;
}

/// A live connection to one voice channel.
#[async_trait::async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Begin frame delivery. Frames are decoded PCM, tagged with the speaking
    /// participant; arrival order across participants is unspecified.
    async fn begin_capture(&mut self) -> Result<mpsc::Receiver<CaptureEvent>>;

    /// Stop frame delivery. Closes the stream returned by `begin_capture`.
    async fn stop_capture(&mut self) -> Result<()>;

    /// Leave the channel.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Maps a participant identifier to a human display name.
#[async_trait::async_trait]
pub trait NameResolver: Send + Sync {
    /// Returns `None` when the participant is unknown; callers fall back to
    /// a name derived from the identifier.
    async fn display_name(&self, participant: ParticipantId) -> Option<String>;
}
