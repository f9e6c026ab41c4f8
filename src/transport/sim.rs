//! In-process transport used by the dev server and the integration tests.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use super::{ChannelInfo, ChannelKind, NameResolver, TransportError, VoiceConnection, VoiceTransport};
use crate::audio::AudioFrame;
use crate::capture::CaptureEvent;
use crate::ids::{ChannelId, ParticipantId};

#[derive(Default)]
struct SimState {
    channels: HashMap<ChannelId, ChannelInfo>,
    names: HashMap<ParticipantId, String>,
    /// Active frame feed per channel, tagged with the owning connection so a
    /// stale connection cannot tear down a newer one's stream.
    feeds: HashMap<ChannelId, (u64, mpsc::Sender<CaptureEvent>)>,
    next_connection: u64,
    refuse_connects: bool,
}

/// Simulated channel layer: channels are registered up front, frames are fed
/// by the test (or demo) driving it.
#[derive(Clone, Default)]
pub struct SimTransport {
    state: Arc<Mutex<SimState>>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_voice_channel(&self, id: ChannelId, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.channels.insert(
            id,
            ChannelInfo {
                id,
                name: name.to_string(),
                kind: ChannelKind::Voice,
            },
        );
    }

    pub fn add_text_channel(&self, id: ChannelId, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.channels.insert(
            id,
            ChannelInfo {
                id,
                name: name.to_string(),
                kind: ChannelKind::Text,
            },
        );
    }

    pub fn set_display_name(&self, participant: ParticipantId, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.names.insert(participant, name.to_string());
    }

    /// Make subsequent `connect` calls fail, for exercising the error path.
    pub fn refuse_connects(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connects = refuse;
    }

    /// Deliver one frame into the channel's active capture stream.
    ///
    /// Returns `false` when nothing is capturing on that channel.
    pub async fn feed(&self, channel: ChannelId, participant: ParticipantId, frame: AudioFrame) -> bool {
        let sender = {
            let state = self.state.lock().unwrap();
            state.feeds.get(&channel).map(|(_, tx)| tx.clone())
        };
        match sender {
            Some(tx) => tx.send(CaptureEvent { participant, frame }).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl VoiceTransport for SimTransport {
    async fn channel_info(&self, channel: ChannelId) -> Result<ChannelInfo, TransportError> {
        let state = self.state.lock().unwrap();
        state
            .channels
            .get(&channel)
            .cloned()
            .ok_or(TransportError::UnknownChannel)
    }

    async fn connect(&self, channel: ChannelId) -> Result<Box<dyn VoiceConnection>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connects {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        if !state.channels.contains_key(&channel) {
            return Err(TransportError::UnknownChannel);
        }
        state.next_connection += 1;
        let token = state.next_connection;
        debug!("Simulated connect to channel {}", channel);
        Ok(Box::new(SimConnection {
            channel,
            token,
            state: Arc::clone(&self.state),
        }))
    }
}

#[async_trait::async_trait]
impl NameResolver for SimTransport {
    async fn display_name(&self, participant: ParticipantId) -> Option<String> {
        self.state.lock().unwrap().names.get(&participant).cloned()
    }
}

struct SimConnection {
    channel: ChannelId,
    token: u64,
    state: Arc<Mutex<SimState>>,
}

impl SimConnection {
    /// Drop this connection's feed sender, closing its frame stream. A feed
    /// installed by a newer connection on the same channel is left alone.
    fn remove_own_feed(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some((token, _)) = state.feeds.get(&self.channel) {
            if *token == self.token {
                state.feeds.remove(&self.channel);
            }
        }
    }
}

#[async_trait::async_trait]
impl VoiceConnection for SimConnection {
    async fn begin_capture(&mut self) -> Result<mpsc::Receiver<CaptureEvent>> {
        let (tx, rx) = mpsc::channel(256);
        self.state
            .lock()
            .unwrap()
            .feeds
            .insert(self.channel, (self.token, tx));
        Ok(rx)
    }

    async fn stop_capture(&mut self) -> Result<()> {
        self.remove_own_feed();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.remove_own_feed();
        debug!("Simulated disconnect from channel {}", self.channel);
        Ok(())
    }
}
