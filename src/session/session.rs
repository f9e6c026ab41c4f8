use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, warn};
use uuid::Uuid;

use crate::capture::{AlignmentCapture, ParticipantCapture};
use crate::ids::{ChannelId, GroupId, ParticipantId};
use crate::transport::VoiceConnection;

/// One recording in progress for one channel-group.
///
/// Owns the live voice connection, the capture sink, and the task draining
/// frames into it. The wall clock (`started_at`) names the session directory
/// and bounds the final duration; the monotonic clock (`started_mono`) is the
/// alignment origin and is immune to wall-clock adjustment.
pub struct Session {
    pub id: Uuid,
    pub group_id: GroupId,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub session_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub started_mono: Instant,

    capture: Arc<AlignmentCapture>,
    connection: Mutex<Option<Box<dyn VoiceConnection>>>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
}

/// Serializable snapshot of an active session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub group_id: GroupId,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub session_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl Session {
    pub fn new(
        group_id: GroupId,
        channel_id: ChannelId,
        channel_name: String,
        session_dir: PathBuf,
        started_at: DateTime<Utc>,
        started_mono: Instant,
        connection: Box<dyn VoiceConnection>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            channel_id,
            channel_name,
            session_dir,
            started_at,
            started_mono,
            capture: Arc::new(AlignmentCapture::new()),
            connection: Mutex::new(Some(connection)),
            drain_task: Mutex::new(None),
        }
    }

    /// Start frame delivery and spawn the task draining frames into the
    /// capture sink.
    pub async fn begin_capture(&self) -> anyhow::Result<()> {
        let mut connection = self.connection.lock().await;
        let conn = connection
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("connection already closed"))?;
        let frames = conn.begin_capture().await?;

        let task = Arc::clone(&self.capture).attach(frames);
        *self.drain_task.lock().await = Some(task);
        Ok(())
    }

    /// Stop frame delivery, wait for the drain task, and take the accumulated
    /// capture state.
    pub async fn end_capture(&self) -> HashMap<ParticipantId, ParticipantCapture> {
        if let Some(conn) = self.connection.lock().await.as_mut() {
            if let Err(e) = conn.stop_capture().await {
                warn!("Failed to stop frame delivery: {}", e);
            }
        }

        if let Some(task) = self.drain_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Capture drain task panicked: {}", e);
            }
        }

        self.capture.finish().await
    }

    /// Leave the voice channel. Best-effort and idempotent.
    pub async fn disconnect(&self) {
        if let Some(mut conn) = self.connection.lock().await.take() {
            if let Err(e) = conn.disconnect().await {
                warn!("Disconnect failed: {}", e);
            }
        }
    }

    pub fn status(&self) -> SessionStatus {
        let duration = Utc::now().signed_duration_since(self.started_at);
        SessionStatus {
            session_id: self.id,
            group_id: self.group_id,
            channel_id: self.channel_id,
            channel_name: self.channel_name.clone(),
            session_dir: self.session_dir.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        }
    }
}
