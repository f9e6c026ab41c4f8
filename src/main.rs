use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use trackmix::archive::NoopArchiver;
use trackmix::http::{create_router, AppState};
use trackmix::session::{Recorder, RecorderConfig};
use trackmix::transport::SimTransport;
use trackmix::Config;
use tracing::info;

/// Voice-channel recorder: one track per participant, plus a time-aligned
/// mixdown.
#[derive(Debug, Parser)]
#[command(name = "trackmix", version)]
struct Args {
    /// Config file (TOML), optional; environment variables with the
    /// TRACKMIX_ prefix override it.
    #[arg(long, default_value = "config/trackmix")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);
    info!("Output root: {}", cfg.recording.output_dir);

    std::fs::create_dir_all(&cfg.recording.output_dir)?;

    // The dev server runs against the in-process transport; a real deployment
    // embeds the library and supplies its platform's VoiceTransport.
    let transport = Arc::new(SimTransport::new());
    let recorder = Arc::new(Recorder::new(
        RecorderConfig::from_config(&cfg),
        transport.clone(),
        transport,
        Arc::new(NoopArchiver),
    ));

    let app = create_router(AppState::new(recorder));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP control surface listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
