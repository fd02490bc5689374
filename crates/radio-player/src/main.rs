mod action;
mod app;
mod app_state;
mod component;
mod components;
mod http;
mod mpv;
mod output;
mod pcm_tap;
mod theme;
mod widgets;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use radio_engine::render::BarSurface;
use radio_engine::{PlaybackEngine, Renderer, Session, SessionEvent, SessionSettings, TimerScheduler};
use radio_proto::config::Config;
use radio_proto::protocol::SessionSnapshot;
use radio_proto::state::FileStore;
use tokio::sync::{broadcast, mpsc};

use crate::output::MpvOutput;
use crate::pcm_tap::PcmTap;

#[derive(Parser, Debug)]
#[command(name = "radio-player", about = "Internet radio with a live spectrum")]
struct Args {
    /// Station list (path or http(s) URL), overrides the configured source
    #[arg(long)]
    stations: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = radio_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("player.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("radio-player log: {}", log_path.display());
    tracing::info!("radio-player starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    // ── Stations ─────────────────────────────────────────────────────────────
    let mut sources = Vec::new();
    sources.extend(args.stations.clone());
    sources.push(config.stations.source.clone());
    let stations = radio_proto::stations::load_stations(&sources).await;

    let prefs = FileStore::open(config.paths.prefs_file.clone());

    // ── Channels ─────────────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(1024);
    let (snapshot_tx, snapshot_rx) = broadcast::channel::<SessionSnapshot>(256);

    // ── Build session ────────────────────────────────────────────────────────
    let tap = PcmTap::new();
    let output = MpvOutput::new(event_tx.clone(), tap);
    let engine = PlaybackEngine::new(output, config.player.fft_size);

    let surface = BarSurface::new();
    let scheduler = TimerScheduler::new(
        event_tx.clone(),
        Duration::from_millis(config.player.frame_interval_ms.max(1)),
    );
    let renderer = Renderer::new(surface.clone(), scheduler);

    let mut session = Session::new(
        engine,
        stations.clone(),
        renderer,
        prefs,
        SessionSettings::from(&config.player),
        event_tx.clone(),
        snapshot_tx,
    );
    session.start().await;
    let initial = session.snapshot();

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            stations.clone(),
            initial.clone(),
            session.subscribe(),
            event_tx.clone(),
        );
    }

    // ── Spawn session event loop ─────────────────────────────────────────────
    let session_task = tokio::spawn(session.run(event_rx));

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(
        stations,
        initial,
        surface,
        event_tx.clone(),
        config.player.pixel_ratio,
    );
    let result = app.run(snapshot_rx).await;

    if event_tx.send(SessionEvent::Shutdown).await.is_err() {
        tracing::warn!("session loop already gone at shutdown");
    }
    if let Err(e) = session_task.await {
        tracing::error!("session task failed: {}", e);
    }
    tracing::info!("radio-player exiting");

    result
}
