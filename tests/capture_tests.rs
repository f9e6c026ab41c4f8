// Integration tests for alignment capture
//
// These verify that per-participant accumulation is correct under concurrent
// frame arrival and that the first-frame instant is recorded exactly once.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use trackmix::audio::AudioFrame;
use trackmix::capture::{AlignmentCapture, CaptureEvent};
use trackmix::ids::ParticipantId;

fn frame(samples: usize) -> AudioFrame {
    AudioFrame {
        samples: vec![250i16; samples],
        sample_rate: 48000,
        channels: 2,
    }
}

#[tokio::test]
async fn concurrent_frames_for_one_participant_accumulate_fully() -> Result<()> {
    let capture = Arc::new(AlignmentCapture::new());
    let participant = ParticipantId(11);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let capture = Arc::clone(&capture);
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                capture.record(participant, frame(10)).await;
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let out = capture.finish().await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[&participant].samples.len(), 16 * 50 * 10);

    Ok(())
}

#[tokio::test]
async fn first_frame_instant_is_never_before_session_start() -> Result<()> {
    let start = Instant::now();
    let capture = AlignmentCapture::new();
    let participant = ParticipantId(5);

    capture.record(participant, frame(4)).await;

    let out = capture.finish().await;
    let first = out[&participant].first_frame;
    assert!(first >= start);
    assert!(first <= Instant::now());

    Ok(())
}

#[tokio::test]
async fn later_frames_do_not_move_the_first_frame_instant() -> Result<()> {
    let capture = AlignmentCapture::new();
    let participant = ParticipantId(6);

    capture.record(participant, frame(4)).await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    capture.record(participant, frame(4)).await;

    let out = capture.finish().await;
    // The recorded instant predates the second frame by at least the sleep.
    assert!(out[&participant].first_frame.elapsed() >= std::time::Duration::from_millis(20));

    Ok(())
}

#[tokio::test]
async fn attach_drains_a_frame_stream_until_it_closes() -> Result<()> {
    let capture = Arc::new(AlignmentCapture::new());
    let (tx, rx) = mpsc::channel(32);

    let drain = Arc::clone(&capture).attach(rx);

    for i in 0..3u64 {
        tx.send(CaptureEvent {
            participant: ParticipantId(i % 2),
            frame: frame(8),
        })
        .await?;
    }
    drop(tx);
    drain.await?;

    let out = capture.finish().await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[&ParticipantId(0)].samples.len(), 16);
    assert_eq!(out[&ParticipantId(1)].samples.len(), 8);

    Ok(())
}

#[tokio::test]
async fn participants_never_recorded_are_absent() -> Result<()> {
    let capture = AlignmentCapture::new();
    capture.record(ParticipantId(1), frame(2)).await;

    let out = capture.finish().await;
    assert!(!out.contains_key(&ParticipantId(2)));

    Ok(())
}
