//! The start/stop pipeline.
//!
//! Start: validate the channel, connect, admit the session, attach capture.
//! Stop: claim the session, end capture, write tracks, mix, archive, drop
//! unretained track files, disconnect, summarize. Steps are strictly
//! sequential within a session; sessions for different groups never share
//! state beyond the registry.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::Archiver;
use crate::audio::track::loosen_permissions;
use crate::audio::{finalize_tracks, sanitize_filename, MixEngine, MixInput, MixOutcome, MixSettings, Track};
use crate::capture::ParticipantCapture;
use crate::config::Config;
use crate::ids::{ChannelId, GroupId, ParticipantId};
use crate::transport::{ChannelKind, NameResolver, TransportError, VoiceTransport};

use super::registry::{SessionRegistry, StopRejection};
use super::session::{Session, SessionStatus};

/// Recording behavior options, typically derived from [`Config`].
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Root directory session directories are created under.
    pub output_dir: PathBuf,
    /// Produce a combined mixdown after each session.
    pub merge_tracks: bool,
    /// Hand the surviving output files to the archiver.
    pub zip_output: bool,
    /// Keep per-participant track files after the mix step.
    pub retain_tracks: bool,
    pub mix: MixSettings,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            merge_tracks: true,
            zip_output: false,
            retain_tracks: false,
            mix: MixSettings::default(),
        }
    }
}

impl RecorderConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            output_dir: PathBuf::from(&cfg.recording.output_dir),
            merge_tracks: cfg.recording.merge_tracks,
            zip_output: cfg.recording.zip_output,
            retain_tracks: cfg.recording.retain_tracks,
            mix: MixSettings {
                ffmpeg_path: cfg.recording.ffmpeg_path.clone(),
                bitrate: cfg.recording.mix_bitrate.clone(),
                sample_rate: cfg.audio.sample_rate,
                channels: cfg.audio.channels,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("no channel found with that ID")]
    UnknownChannel,
    #[error("channel is not a voice channel")]
    NotVoiceChannel,
    #[error("a recording is already in progress on channel ID {0}")]
    AlreadyActive(ChannelId),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("failed to prepare session directory: {0}")]
    SessionDir(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StopError {
    #[error(transparent)]
    Rejected(#[from] StopRejection),
    /// Unexpected internal fault during finalize; fatal to this session only.
    /// The registry entry is already released when this surfaces.
    #[error(transparent)]
    Finalize(#[from] anyhow::Error),
}

/// Confirmation that a session started.
#[derive(Debug, Clone, Serialize)]
pub struct StartReceipt {
    pub session_id: Uuid,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub session_dir: PathBuf,
}

/// Everything a caller needs to describe a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct StopSummary {
    pub session_id: Uuid,
    pub channel_id: ChannelId,
    pub session_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub tracks: Vec<Track>,
    /// Whether per-track files were kept on disk.
    pub tracks_retained: bool,
    pub mix_path: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
}

/// Ties the collaborators together and drives the session lifecycle.
pub struct Recorder {
    config: RecorderConfig,
    registry: SessionRegistry,
    mixer: MixEngine,
    transport: Arc<dyn VoiceTransport>,
    resolver: Arc<dyn NameResolver>,
    archiver: Arc<dyn Archiver>,
}

impl Recorder {
    pub fn new(
        config: RecorderConfig,
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn NameResolver>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        let mixer = MixEngine::new(config.mix.clone());
        Self {
            config,
            registry: SessionRegistry::new(),
            mixer,
            transport,
            resolver,
            archiver,
        }
    }

    /// Status of the group's active session, if any.
    pub async fn status(&self, group: GroupId) -> Option<SessionStatus> {
        self.registry.get(group).await.map(|s| s.status())
    }

    /// Admit and start a recording session on a voice channel.
    ///
    /// Every failure leaves no residual state: the group stays (or becomes)
    /// free and any half-open connection is torn down.
    pub async fn start(&self, group: GroupId, channel: ChannelId) -> Result<StartReceipt, StartError> {
        // Fast-path admission check before paying for a connect. Admission is
        // re-checked atomically at insert below.
        if let Some(active) = self.registry.get(group).await {
            return Err(StartError::AlreadyActive(active.channel_id));
        }

        let info = self
            .transport
            .channel_info(channel)
            .await
            .map_err(|_| StartError::UnknownChannel)?;
        if info.kind != ChannelKind::Voice {
            return Err(StartError::NotVoiceChannel);
        }

        let connection = self
            .transport
            .connect(channel)
            .await
            .map_err(|e| match e {
                TransportError::UnknownChannel => StartError::UnknownChannel,
                TransportError::Connect(msg) => StartError::Connect(msg),
            })?;

        let started_at = Utc::now();
        let started_mono = Instant::now();
        let stamp = started_at.format("%Y-%m-%dT%H-%M-%S").to_string();
        let session_dir = self
            .config
            .output_dir
            .join(sanitize_filename(&info.name))
            .join(sanitize_filename(&stamp));

        let session = Arc::new(Session::new(
            group,
            channel,
            info.name.clone(),
            session_dir.clone(),
            started_at,
            started_mono,
            connection,
        ));

        if let Err(active) = self.registry.try_start(Arc::clone(&session)).await {
            // Lost a concurrent start race after connecting.
            session.disconnect().await;
            return Err(StartError::AlreadyActive(active.channel_id));
        }

        if let Err(e) = create_session_dir(&session_dir) {
            self.registry.remove(group).await;
            session.disconnect().await;
            return Err(StartError::SessionDir(e));
        }

        if let Err(e) = session.begin_capture().await {
            self.registry.remove(group).await;
            session.disconnect().await;
            return Err(StartError::Connect(e.to_string()));
        }

        info!(
            "Recording session {} started in {} (channel ID {}), output {}",
            session.id,
            info.name,
            channel,
            session_dir.display()
        );

        Ok(StartReceipt {
            session_id: session.id,
            channel_id: channel,
            channel_name: info.name,
            session_dir,
        })
    }

    /// End the session bound to the given channel and run the finalize
    /// pipeline.
    ///
    /// The session is claimed from the registry up front, so a second stop
    /// request (or one arriving mid-finalize) observes no active session, and
    /// the registry is clean no matter how finalization ends.
    pub async fn stop(&self, group: GroupId, channel: ChannelId) -> Result<StopSummary, StopError> {
        let session = self.registry.take_matching(group, channel).await?;
        info!("Stopping recording session {}", session.id);

        let captures = session.end_capture().await;
        let ended_at = Utc::now();

        let result = self.finalize(&session, captures, ended_at).await;
        session.disconnect().await;

        match &result {
            Ok(summary) => info!(
                "Recording session {} finished: {} track(s), mix {}",
                session.id,
                summary.tracks.len(),
                summary
                    .mix_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "absent".to_string())
            ),
            Err(e) => warn!("Recording session {} finalize failed: {}", session.id, e),
        }

        result.map_err(StopError::from)
    }

    async fn finalize(
        &self,
        session: &Session,
        captures: HashMap<ParticipantId, ParticipantCapture>,
        ended_at: DateTime<Utc>,
    ) -> anyhow::Result<StopSummary> {
        let tracks = finalize_tracks(
            &session.session_dir,
            session.started_mono,
            captures,
            self.resolver.as_ref(),
        )
        .await
        .context("Failed to finalize tracks")?;

        let target_duration = session_duration(session.started_at, ended_at);

        let mix_path = if self.config.merge_tracks && !tracks.is_empty() {
            self.run_mix(session, &tracks, target_duration).await
        } else {
            None
        };

        if !self.config.retain_tracks {
            // Mix step is over; drop the per-track files whether or not it
            // succeeded.
            for track in &tracks {
                if let Err(e) = std::fs::remove_file(&track.path) {
                    warn!("Could not remove track file {}: {}", track.path.display(), e);
                }
            }
        }

        let archive_path = if self.config.zip_output {
            let mut files: Vec<PathBuf> = Vec::new();
            if self.config.retain_tracks {
                files.extend(tracks.iter().map(|t| t.path.clone()));
            }
            files.extend(mix_path.clone());
            self.run_archive(session, &files).await
        } else {
            None
        };

        Ok(StopSummary {
            session_id: session.id,
            channel_id: session.channel_id,
            session_dir: session.session_dir.clone(),
            started_at: session.started_at,
            duration_secs: target_duration.map(|d| d.as_secs_f64()).unwrap_or(0.0),
            tracks,
            tracks_retained: self.config.retain_tracks,
            mix_path,
            archive_path,
        })
    }

    /// Mix failures are logged and leave the mix absent; per-track files (if
    /// retained) remain the fallback deliverable.
    async fn run_mix(
        &self,
        session: &Session,
        tracks: &[Track],
        target_duration: Option<Duration>,
    ) -> Option<PathBuf> {
        let inputs: Vec<MixInput> = tracks
            .iter()
            .map(|t| MixInput {
                path: t.path.clone(),
                delay_ms: t.delay_ms,
            })
            .collect();
        let output = session.session_dir.join("mixdown.mp3");

        match self.mixer.mix(&inputs, &output, target_duration).await {
            Ok(MixOutcome::Mixed(path)) => {
                loosen_permissions(&path, 0o666);
                Some(path)
            }
            Ok(MixOutcome::Skipped) => None,
            Err(e) => {
                warn!("Failed to mix tracks: {}", e);
                None
            }
        }
    }

    async fn run_archive(&self, session: &Session, files: &[PathBuf]) -> Option<PathBuf> {
        if files.is_empty() {
            return None;
        }
        match self.archiver.archive(&session.session_dir, files).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Archiving failed: {}", e);
                None
            }
        }
    }
}

fn create_session_dir(dir: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    // Created with permissive access so operator tooling can retrieve files.
    loosen_permissions(dir, 0o777);
    Ok(())
}

/// Wall-clock session length, when the clocks agree it is positive.
fn session_duration(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Option<Duration> {
    ended_at
        .signed_duration_since(started_at)
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
}
