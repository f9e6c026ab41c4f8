use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    /// Root directory session output is written under.
    pub output_dir: String,
    /// Produce a combined mixdown after each session.
    pub merge_tracks: bool,
    /// Package surviving output files into an archive.
    pub zip_output: bool,
    /// Keep per-participant track files after mixing.
    pub retain_tracks: bool,
    /// MP3 bitrate for the mixdown.
    pub mix_bitrate: String,
    /// ffmpeg binary to invoke for mixing.
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of the generated silence source in the mix.
    pub sample_rate: u32,
    /// Channel count of the generated silence source.
    pub channels: u16,
}

impl Config {
    /// Load configuration: baked-in defaults, overlaid by an optional config
    /// file, overlaid by `TRACKMIX_`-prefixed environment variables
    /// (e.g. `TRACKMIX_RECORDING__ZIP_OUTPUT=true`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "trackmix")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8080i64)?
            .set_default("recording.output_dir", "recordings")?
            .set_default("recording.merge_tracks", true)?
            .set_default("recording.zip_output", false)?
            .set_default("recording.retain_tracks", false)?
            .set_default("recording.mix_bitrate", "64k")?
            .set_default("recording.ffmpeg_path", "ffmpeg")?
            .set_default("audio.sample_rate", 48000i64)?
            .set_default("audio.channels", 2i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TRACKMIX").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
