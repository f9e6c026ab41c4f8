//! Per-participant frame capture with first-frame alignment timestamps.
//!
//! `AlignmentCapture` consumes participant-tagged audio frames as they arrive
//! from the transport and accumulates raw PCM per participant. The monotonic
//! instant of each participant's first frame is recorded so that tracks can
//! later be offset against the session start. Wall-clock time is never used
//! here: it can jump under NTP sync or DST, monotonic time cannot.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audio::AudioFrame;
use crate::ids::ParticipantId;

/// One participant-tagged frame delivered by the transport.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    pub participant: ParticipantId,
    pub frame: AudioFrame,
}

/// Accumulated state for one participant during a session.
#[derive(Debug)]
pub struct ParticipantCapture {
    /// Monotonic instant of this participant's first frame. Set exactly once,
    /// when the participant's entry is created under the capture lock.
    pub first_frame: Instant,
    /// Accumulated raw samples (i16 PCM, interleaved).
    pub samples: Vec<i16>,
    /// Sample format, fixed by the participant's first frame.
    pub sample_rate: u32,
    pub channels: u16,
}

/// Capture sink for one recording session.
#[derive(Default)]
pub struct AlignmentCapture {
    participants: Mutex<HashMap<ParticipantId, ParticipantCapture>>,
}

impl AlignmentCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame for a participant.
    ///
    /// Safe to call from concurrent tasks: the first-frame instant is
    /// check-and-set under the capture lock, so exactly one write wins even
    /// when a participant's frames arrive on overlapping callbacks. Frames
    /// whose format differs from the participant's first frame are dropped.
    pub async fn record(&self, participant: ParticipantId, frame: AudioFrame) {
        let mut participants = self.participants.lock().await;

        match participants.entry(participant) {
            Entry::Occupied(mut entry) => {
                let capture = entry.get_mut();
                if frame.sample_rate != capture.sample_rate || frame.channels != capture.channels {
                    warn!(
                        "Dropping frame from {} with mismatched format: expected {}Hz/{}ch, got {}Hz/{}ch",
                        participant,
                        capture.sample_rate,
                        capture.channels,
                        frame.sample_rate,
                        frame.channels
                    );
                    return;
                }
                capture.samples.extend_from_slice(&frame.samples);
            }
            Entry::Vacant(entry) => {
                debug!("First frame from participant {}", participant);
                entry.insert(ParticipantCapture {
                    first_frame: Instant::now(),
                    samples: frame.samples,
                    sample_rate: frame.sample_rate,
                    channels: frame.channels,
                });
            }
        }
    }

    /// Take the accumulated per-participant state. Participants who never
    /// produced a frame are simply absent from the map.
    pub async fn finish(&self) -> HashMap<ParticipantId, ParticipantCapture> {
        let mut participants = self.participants.lock().await;
        std::mem::take(&mut *participants)
    }

    /// Spawn a task that drains a transport frame stream into this capture.
    ///
    /// The task ends when the stream closes (transport stopped delivery).
    pub fn attach(self: Arc<Self>, mut frames: mpsc::Receiver<CaptureEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = frames.recv().await {
                self.record(event.participant, event.frame).await;
            }
            debug!("Frame stream closed, capture drain task ending");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 48000,
            channels: 2,
        }
    }

    #[tokio::test]
    async fn accumulates_samples_per_participant() {
        let capture = AlignmentCapture::new();
        let alice = ParticipantId(1);
        let bob = ParticipantId(2);

        capture.record(alice, frame(vec![1, 2, 3])).await;
        capture.record(bob, frame(vec![9])).await;
        capture.record(alice, frame(vec![4, 5])).await;

        let out = capture.finish().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[&alice].samples, vec![1, 2, 3, 4, 5]);
        assert_eq!(out[&bob].samples, vec![9]);
    }

    #[tokio::test]
    async fn first_frame_instant_is_not_before_session_start() {
        let start = Instant::now();
        let capture = AlignmentCapture::new();
        capture.record(ParticipantId(7), frame(vec![0; 16])).await;

        let out = capture.finish().await;
        assert!(out[&ParticipantId(7)].first_frame >= start);
    }

    #[tokio::test]
    async fn mismatched_format_frames_are_dropped() {
        let capture = AlignmentCapture::new();
        let id = ParticipantId(3);

        capture.record(id, frame(vec![1, 2])).await;
        capture
            .record(
                id,
                AudioFrame {
                    samples: vec![3, 4],
                    sample_rate: 16000,
                    channels: 1,
                },
            )
            .await;

        let out = capture.finish().await;
        assert_eq!(out[&id].samples, vec![1, 2]);
        assert_eq!(out[&id].sample_rate, 48000);
    }

    #[tokio::test]
    async fn finish_drains_the_capture() {
        let capture = AlignmentCapture::new();
        capture.record(ParticipantId(1), frame(vec![1])).await;

        assert_eq!(capture.finish().await.len(), 1);
        assert!(capture.finish().await.is_empty());
    }
}
