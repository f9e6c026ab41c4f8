//! Delay-compensated multi-track mixdown via ffmpeg.
//!
//! Argument-list construction is a pure function, separated from process
//! invocation so the mixing graph can be unit tested without spawning
//! anything. Each input track is padded with leading silence equal to its
//! own alignment delay (`adelay`), then all tracks are summed with
//! normalization (`amix`). When the session duration is known, a pure-silence
//! input of that length is added so the mix is never shorter than the session
//! and always starts at t=0.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Encoder and silence-source settings for the mixdown.
#[derive(Debug, Clone)]
pub struct MixSettings {
    /// ffmpeg binary to invoke.
    pub ffmpeg_path: String,
    /// MP3 bitrate passed to `-b:a`.
    pub bitrate: String,
    /// Sample rate of the generated silence source.
    pub sample_rate: u32,
    /// Channel count of the generated silence source.
    pub channels: u16,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            bitrate: "64k".to_string(),
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// One track going into the mix: its file and its alignment delay.
#[derive(Debug, Clone)]
pub struct MixInput {
    pub path: PathBuf,
    pub delay_ms: u64,
}

/// What the mix step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixOutcome {
    /// Combined file written to the given path.
    Mixed(PathBuf),
    /// Nothing to mix; no file produced. Not an error.
    Skipped,
}

#[derive(Debug, Error)]
pub enum MixError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Tool {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("failed to copy single track to mix output: {0}")]
    Copy(#[from] std::io::Error),
}

/// Build the full ffmpeg argument list for mixing two or more tracks.
///
/// Layout: one `-i` per track, then (when `target_duration` is known) one
/// lavfi `anullsrc` input of exactly that length, then a `filter_complex`
/// that delays each track and sums everything, mapped to an MP3 encode.
pub fn build_mix_args(
    inputs: &[MixInput],
    output: &Path,
    target_duration: Option<Duration>,
    settings: &MixSettings,
) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.path.to_string_lossy().to_string());
    }

    let silence = target_duration.filter(|d| !d.is_zero());
    if let Some(duration) = silence {
        let layout = if settings.channels == 1 { "mono" } else { "stereo" };
        args.extend([
            "-f".to_string(),
            "lavfi".to_string(),
            "-t".to_string(),
            format!("{}", duration.as_secs_f64()),
            "-i".to_string(),
            format!("anullsrc=r={}:cl={}", settings.sample_rate, layout),
        ]);
    }

    let mut filter_parts: Vec<String> = Vec::new();
    let mut labels = String::new();
    for (idx, input) in inputs.iter().enumerate() {
        filter_parts.push(format!("[{idx}:a]adelay={}:all=1[a{idx}]", input.delay_ms));
        labels.push_str(&format!("[a{idx}]"));
    }

    let mut mix_inputs = inputs.len();
    if silence.is_some() {
        // The silence source is the last input; it needs no delay.
        labels.push_str(&format!("[{}:a]", inputs.len()));
        mix_inputs += 1;
    }
    filter_parts.push(format!(
        "{labels}amix=inputs={mix_inputs}:duration=longest:normalize=1[aout]"
    ));

    args.extend([
        "-filter_complex".to_string(),
        filter_parts.join(";"),
        "-map".to_string(),
        "[aout]".to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-b:a".to_string(),
        settings.bitrate.clone(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

/// Runs the mixdown for a finalized track set.
pub struct MixEngine {
    settings: MixSettings,
}

impl MixEngine {
    pub fn new(settings: MixSettings) -> Self {
        Self { settings }
    }

    /// Mix the given tracks into `output`.
    ///
    /// Zero tracks is a no-op. A single track is copied verbatim to the
    /// output path; its delay is not applied on this shortcut path, unlike
    /// the multi-track path, which honors every delay.
    pub async fn mix(
        &self,
        inputs: &[MixInput],
        output: &Path,
        target_duration: Option<Duration>,
    ) -> Result<MixOutcome, MixError> {
        if inputs.is_empty() {
            return Ok(MixOutcome::Skipped);
        }

        if inputs.len() == 1 {
            tokio::fs::copy(&inputs[0].path, output).await?;
            info!("Single track, copied to {}", output.display());
            return Ok(MixOutcome::Mixed(output.to_path_buf()));
        }

        let args = build_mix_args(inputs, output, target_duration, &self.settings);
        debug!("Invoking {} {:?}", self.settings.ffmpeg_path, args);

        let result = Command::new(&self.settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MixError::Spawn {
                tool: self.settings.ffmpeg_path.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = truncate_lossy(&result.stderr, 500);
            return Err(MixError::Tool {
                tool: self.settings.ffmpeg_path.clone(),
                status: result.status,
                stderr,
            });
        }

        info!(
            "Mixed {} tracks into {}",
            inputs.len(),
            output.display()
        );
        Ok(MixOutcome::Mixed(output.to_path_buf()))
    }
}

/// First `max_bytes` of tool output as a string, cut on a char boundary.
fn truncate_lossy(bytes: &[u8], max_bytes: usize) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.len() > max_bytes {
        let mut end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}
