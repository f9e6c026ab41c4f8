//! Track finalization: turns accumulated per-participant capture state into
//! named WAV files with alignment delays.

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::capture::ParticipantCapture;
use crate::ids::ParticipantId;
use crate::transport::NameResolver;

/// One participant's finalized audio file plus its alignment delay.
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub participant: ParticipantId,
    pub display_name: String,
    pub path: PathBuf,
    pub byte_len: u64,
    /// Milliseconds of leading silence this track needs before mixing so all
    /// tracks share the session-start timeline origin.
    pub delay_ms: u64,
}

/// Reduce a display name to a filesystem-safe token.
///
/// Keeps alphanumerics, dot, underscore and hyphen; every other run of
/// characters collapses into a single underscore. Leading and trailing
/// `.`/`_`/`-` are stripped, which also neutralizes `.` and `..`. An empty
/// result falls back to `"audio"`.
pub fn sanitize_filename(name: &str) -> String {
    let mut safe = String::with_capacity(name.len());
    let mut last_was_replacement = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            safe.push(c);
            last_was_replacement = false;
        } else if !last_was_replacement {
            safe.push('_');
            last_was_replacement = true;
        }
    }

    let trimmed = safe.trim_matches(|c| matches!(c, '.' | '_' | '-'));
    if trimmed.is_empty() {
        "audio".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Delay of a track relative to the session start, in milliseconds.
///
/// Both instants come from the monotonic clock, so wall-clock adjustments
/// during the session cannot change the result. A first frame that predates
/// the session start clamps to zero.
pub fn compute_delay_ms(session_start: Instant, first_frame: Instant) -> u64 {
    let offset = first_frame.saturating_duration_since(session_start);
    (offset.as_secs_f64() * 1000.0).round() as u64
}

/// Write one track per participant with a non-empty buffer.
///
/// Participants who never produced audio are dropped silently. Display names
/// are resolved concurrently through the injected resolver, falling back to
/// `user-<id>`.
pub async fn finalize_tracks(
    session_dir: &Path,
    session_start: Instant,
    captures: HashMap<ParticipantId, ParticipantCapture>,
    resolver: &dyn NameResolver,
) -> Result<Vec<Track>> {
    let mut speakers: Vec<(ParticipantId, ParticipantCapture)> = Vec::new();
    for (participant, capture) in captures {
        if capture.samples.is_empty() {
            debug!("Participant {} never spoke, skipping", participant);
            continue;
        }
        speakers.push((participant, capture));
    }

    let names = join_all(
        speakers
            .iter()
            .map(|(participant, _)| resolver.display_name(*participant)),
    )
    .await;

    let mut tracks = Vec::with_capacity(speakers.len());
    for ((participant, capture), name) in speakers.into_iter().zip(names) {
        let display_name = sanitize_filename(&name.unwrap_or_else(|| format!("user-{}", participant)));
        let path = session_dir.join(format!("{}_{}.wav", display_name, participant));

        write_wav(&path, &capture)
            .with_context(|| format!("Failed to write track {:?}", path))?;
        loosen_permissions(&path, 0o666);

        let byte_len = std::fs::metadata(&path)
            .with_context(|| format!("Failed to stat track {:?}", path))?
            .len();
        let delay_ms = compute_delay_ms(session_start, capture.first_frame);

        info!(
            "Finalized track for {} ({}): {} bytes, delay {}ms",
            display_name, participant, byte_len, delay_ms
        );

        tracks.push(Track {
            participant,
            display_name,
            path,
            byte_len,
            delay_ms,
        });
    }

    Ok(tracks)
}

fn write_wav(path: &Path, capture: &ParticipantCapture) -> Result<()> {
    let spec = hound::WavSpec {
        channels: capture.channels,
        sample_rate: capture.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .context("Failed to create WAV file")?;
    for &sample in &capture.samples {
        writer
            .write_sample(sample)
            .context("Failed to write sample to WAV")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Best-effort permission loosening so operator tooling outside the service
/// account can pick up the output files. Never fatal.
pub(crate) fn loosen_permissions(path: &Path, mode: u32) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
            warn!("Could not loosen permissions on {}: {}", path.display(), e);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_filename("alice_01.take-2"), "alice_01.take-2");
    }

    #[test]
    fn sanitize_collapses_runs_of_unsafe_characters() {
        assert_eq!(sanitize_filename("José  Müller"), "Jos_M_ller");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
    }

    #[test]
    fn sanitize_strips_leading_and_trailing_separators() {
        assert_eq!(sanitize_filename("__weird name__"), "weird_name");
        assert_eq!(sanitize_filename("../../etc"), "etc");
    }

    #[test]
    fn sanitize_falls_back_when_nothing_survives() {
        assert_eq!(sanitize_filename(""), "audio");
        assert_eq!(sanitize_filename("..."), "audio");
        assert_eq!(sanitize_filename("🎤🎶"), "audio");
    }

    #[test]
    fn delay_is_elapsed_monotonic_time() {
        let start = Instant::now();
        let first = start.checked_add(Duration::from_millis(2000)).unwrap();
        assert_eq!(compute_delay_ms(start, first), 2000);
    }

    #[test]
    fn delay_clamps_to_zero_for_early_frames() {
        let first = Instant::now();
        let start = first.checked_add(Duration::from_millis(500)).unwrap();
        assert_eq!(compute_delay_ms(start, first), 0);
    }
}
