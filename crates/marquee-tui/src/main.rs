mod action;
mod app;
mod app_state;
mod component;
mod components;
mod engine;
mod focus;
mod grid;
mod images;
mod player;
mod theme;
mod widgets;

use std::sync::Arc;

use anyhow::bail;
use marquee_proto::config::SettingsStore;
use marquee_proto::http::HttpCatalog;
use marquee_proto::platform;
use tokio::sync::mpsc;

use crate::engine::{EngineEvent, EngineHost, MediaEngine};
use crate::engine::mpv::MpvEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut server_arg: Option<String> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--use-system-deps" => platform::set_use_system_deps(true),
            "--server" => server_arg = args.next(),
            other => bail!("unknown argument: {} (expected --server <id> or --use-system-deps)", other),
        }
    }

    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("marquee.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("marquee log: {}", log_path.display());
    tracing::info!("marquee starting…");

    // ── Settings ─────────────────────────────────────────────────────────────
    let store = SettingsStore::open_default()?;
    if let Some(id) = server_arg {
        store.set_current_server(&id).await?;
    }
    let settings = store.get().await;
    if settings.token_expired(chrono::Utc::now()) {
        tracing::warn!("stored sign-in expired; clearing it");
        store.clear_auth().await?;
        bail!(
            "sign-in expired; put a fresh token in {}",
            store.path().display()
        );
    }
    let catalog = match HttpCatalog::from_settings(&settings) {
        Ok(c) => c,
        Err(e) => bail!("{} (add a server to {})", e, store.path().display()),
    };

    // ── Media engine ─────────────────────────────────────────────────────────
    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(256);
    let mut engine = MpvEngine::new(engine_tx, settings.playback.cache_mb);
    if let Err(e) = engine.init() {
        // Browsing still works; play attempts surface the engine error.
        tracing::warn!("media engine unavailable: {}", e);
        eprintln!("warning: {}", e);
    }
    let host = EngineHost::new(engine);

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(store, Arc::new(catalog), host, engine_rx).await;
    let result = app.run().await;
    if let Err(e) = &result {
        tracing::error!("app exited with error: {:#}", e);
    }
    result
}
