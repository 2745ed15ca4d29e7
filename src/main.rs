//! Application entry point for the `dht-dashboard` service.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - In dashboard mode: loading the history store, choosing the reading
//!   source and history query strategy, and spawning the live updater
//! - In device mode: serving the simulated sensor API
//! - Mounting all routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! See [`dht_dashboard::config::load_from_env`] for the full list. Logging is
//! controlled by:
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – force ANSI colors on or off
use std::{env, io::IsTerminal, net::SocketAddr};

use axum::Router;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use dht_dashboard::config::{self, Mode, Variant};
use dht_dashboard::routes::{self, DashboardState};
use dht_dashboard::{
    AnyHistory, AnySource, Config, DeviceClient, FileKv, HistoryPopup, HistoryStore, LiveUpdater,
    LocalHistory, SimulatedSource,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let app: Router = match cfg.mode {
        Mode::Device => {
            tracing::info!("Serving simulated device API");
            routes::device_router()
        }
        Mode::Dashboard => build_dashboard(&cfg)?,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Wire the reading source, history and updater for the configured variant,
/// spawn the updater, and return the dashboard router.
fn build_dashboard(cfg: &Config) -> Result<Router> {
    // ---
    match &cfg.variant {
        Variant::Local => {
            let kv = FileKv::open(&cfg.history_dir).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to open history directory '{}': {}",
                    cfg.history_dir.display(),
                    e
                )
            })?;
            let store = HistoryStore::load(kv, cfg.history_retention_days).into_shared();

            let updater =
                LiveUpdater::new(AnySource::Simulated(SimulatedSource), Some(store.clone()))
                    .with_period(cfg.poll_interval);
            let history = AnyHistory::Local(LocalHistory::new(store));
            let popup = HistoryPopup::new(history, "history");
            let state = DashboardState::new(updater.control(), popup);

            tokio::spawn(updater.run());
            Ok(routes::dashboard_router(state))
        }
        Variant::Remote { device_url } => {
            let client = DeviceClient::new(device_url, cfg.http_timeout)?;
            tracing::info!("Reading from device at {}", client.base_url());

            let updater: LiveUpdater<_, FileKv> =
                LiveUpdater::new(AnySource::Remote(client.clone()), None)
                    .with_period(cfg.poll_interval);
            let history: AnyHistory<FileKv> = AnyHistory::Remote(client);
            let popup = HistoryPopup::new(history, "history");
            let state = DashboardState::new(updater.control(), popup);

            tokio::spawn(updater.run());
            Ok(routes::dashboard_router(state))
        }
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, falling back to `AXUM_LOG_LEVEL`
///
/// Called once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper_util=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
