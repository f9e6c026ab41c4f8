// Integration tests for track finalization
//
// These verify that accumulated capture state becomes correctly named WAV
// files with monotonic-clock delays, and that silent participants leave
// nothing behind.

use anyhow::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use trackmix::audio::finalize_tracks;
use trackmix::capture::ParticipantCapture;
use trackmix::ids::ParticipantId;
use trackmix::transport::SimTransport;

fn capture(first_frame: Instant, samples: Vec<i16>) -> ParticipantCapture {
    ParticipantCapture {
        first_frame,
        samples,
        sample_rate: 48000,
        channels: 2,
    }
}

fn resolver() -> SimTransport {
    SimTransport::new()
}

#[tokio::test]
async fn writes_one_wav_per_speaking_participant() -> Result<()> {
    let dir = TempDir::new()?;
    let sim = resolver();
    sim.set_display_name(ParticipantId(11), "Alice");

    let start = Instant::now();
    let mut captures = HashMap::new();
    captures.insert(ParticipantId(11), capture(start, vec![1, 2, 3, 4]));

    let tracks = finalize_tracks(dir.path(), start, captures, &sim).await?;

    assert_eq!(tracks.len(), 1);
    let track = &tracks[0];
    assert_eq!(track.display_name, "Alice");
    assert_eq!(track.path, dir.path().join("Alice_11.wav"));
    assert!(track.byte_len > 0);

    let reader = hound::WavReader::open(&track.path)?;
    assert_eq!(reader.spec().sample_rate, 48000);
    assert_eq!(reader.spec().channels, 2);
    let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples, vec![1, 2, 3, 4]);

    Ok(())
}

#[tokio::test]
async fn silent_participants_produce_no_track_and_no_file() -> Result<()> {
    let dir = TempDir::new()?;
    let sim = resolver();

    let start = Instant::now();
    let mut captures = HashMap::new();
    captures.insert(ParticipantId(1), capture(start, vec![7; 10]));
    captures.insert(ParticipantId(2), capture(start, Vec::new()));

    let tracks = finalize_tracks(dir.path(), start, captures, &sim).await?;

    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].participant, ParticipantId(1));

    let entries: Vec<_> = std::fs::read_dir(dir.path())?.collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 1, "only the speaking participant's file exists");

    Ok(())
}

#[tokio::test]
async fn delays_derive_from_the_monotonic_clock() -> Result<()> {
    let dir = TempDir::new()?;
    let sim = resolver();

    let start = Instant::now();
    let late = start.checked_add(Duration::from_millis(2000)).unwrap();
    // A first frame that predates the session start clamps to zero rather
    // than going negative.
    let early = start;

    let mut captures = HashMap::new();
    captures.insert(ParticipantId(1), capture(early, vec![1; 8]));
    captures.insert(ParticipantId(2), capture(late, vec![2; 8]));

    let mut tracks = finalize_tracks(dir.path(), start, captures, &sim).await?;
    tracks.sort_by_key(|t| t.participant.0);

    assert_eq!(tracks[0].delay_ms, 0);
    assert_eq!(tracks[1].delay_ms, 2000);

    Ok(())
}

#[tokio::test]
async fn display_names_fall_back_to_the_identifier() -> Result<()> {
    let dir = TempDir::new()?;
    let sim = resolver();

    let start = Instant::now();
    let mut captures = HashMap::new();
    captures.insert(ParticipantId(404), capture(start, vec![1; 4]));

    let tracks = finalize_tracks(dir.path(), start, captures, &sim).await?;

    assert_eq!(tracks[0].display_name, "user-404");
    assert!(dir.path().join("user-404_404.wav").exists());

    Ok(())
}

#[tokio::test]
async fn display_names_are_sanitized_for_the_filesystem() -> Result<()> {
    let dir = TempDir::new()?;
    let sim = resolver();
    sim.set_display_name(ParticipantId(8), "Ana / García");
    sim.set_display_name(ParticipantId(9), "..//..");

    let start = Instant::now();
    let mut captures = HashMap::new();
    captures.insert(ParticipantId(8), capture(start, vec![1; 4]));
    captures.insert(ParticipantId(9), capture(start, vec![2; 4]));

    let tracks = finalize_tracks(dir.path(), start, captures, &sim).await?;

    let names: Vec<&str> = tracks.iter().map(|t| t.display_name.as_str()).collect();
    assert!(names.contains(&"Ana_Garc_a"));
    assert!(names.contains(&"audio"));
    assert!(dir.path().join("Ana_Garc_a_8.wav").exists());
    assert!(dir.path().join("audio_9.wav").exists());

    Ok(())
}
