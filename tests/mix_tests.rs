// Integration tests for the mix engine
//
// Graph construction is covered by unit tests next to the builder; these
// exercise the engine's zero/one-track shortcuts and its failure reporting
// without depending on an ffmpeg installation.

use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;
use trackmix::audio::{MixEngine, MixError, MixInput, MixOutcome, MixSettings};

#[tokio::test]
async fn zero_tracks_produce_no_mix_and_no_error() -> Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("mixdown.mp3");

    let engine = MixEngine::new(MixSettings::default());
    let outcome = engine.mix(&[], &output, None).await?;

    assert_eq!(outcome, MixOutcome::Skipped);
    assert!(!output.exists());

    Ok(())
}

#[tokio::test]
async fn single_track_is_copied_byte_identical() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("only.wav");
    std::fs::write(&input, b"RIFF-not-really-but-bytes")?;
    let output = dir.path().join("mixdown.mp3");

    let engine = MixEngine::new(MixSettings::default());
    let outcome = engine
        .mix(
            &[MixInput {
                path: input.clone(),
                // The single-track shortcut disregards the delay.
                delay_ms: 1500,
            }],
            &output,
            None,
        )
        .await?;

    assert_eq!(outcome, MixOutcome::Mixed(output.clone()));
    assert_eq!(std::fs::read(&input)?, std::fs::read(&output)?);

    Ok(())
}

#[tokio::test]
async fn tool_spawn_failure_is_reported_not_swallowed() -> Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("mixdown.mp3");

    let engine = MixEngine::new(MixSettings {
        ffmpeg_path: "/nonexistent/trackmix-test-ffmpeg".to_string(),
        ..MixSettings::default()
    });

    let inputs = vec![
        MixInput {
            path: PathBuf::from("a.wav"),
            delay_ms: 0,
        },
        MixInput {
            path: PathBuf::from("b.wav"),
            delay_ms: 250,
        },
    ];

    let err = engine.mix(&inputs, &output, None).await.unwrap_err();
    assert!(matches!(err, MixError::Spawn { .. }));
    assert!(!output.exists());

    Ok(())
}
