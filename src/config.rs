//! Configuration loader for the `dht-dashboard` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

/// Parse an optional integer variable with a default value.
macro_rules! parse_env_u32 {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Which process this binary runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Poll readings, keep history, serve the dashboard endpoints.
    Dashboard,
    /// Serve the simulated device API.
    Device,
}

/// Where the dashboard gets readings and history from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    /// Simulated readings, history recorded locally.
    Local,
    /// Readings and hourly history from the device at this base URL.
    Remote { device_url: String },
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    pub mode: Mode,

    pub variant: Variant,

    /// TCP port for the HTTP server.
    pub listen_port: u16,

    /// Live display update period.
    pub poll_interval: Duration,

    /// Upper bound on every request to the device.
    pub http_timeout: Duration,

    /// Directory holding the persisted history blob.
    pub history_dir: PathBuf,

    /// Calendar days of history to keep; 0 keeps everything.
    pub history_retention_days: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DEVICE_URL` – device base URL, only when `DASHBOARD_VARIANT=remote`
///
/// Optional:
/// - `APP_MODE` – `dashboard` or `device` (default: dashboard)
/// - `DASHBOARD_VARIANT` – `local` or `remote` (default: local)
/// - `LISTEN_PORT` – HTTP port (default: 8080)
/// - `POLL_INTERVAL_SECS` – update period (default: 3)
/// - `HTTP_TIMEOUT_SECS` – device request timeout (default: 10)
/// - `HISTORY_DIR` – history storage directory (default: ./data)
/// - `HISTORY_RETENTION_DAYS` – days of history kept (default: 30)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let mode = match lookup("APP_MODE").as_deref().map(str::to_lowercase).as_deref() {
        None | Some("dashboard") => Mode::Dashboard,
        Some("device") => Mode::Device,
        Some(other) => bail!("Invalid APP_MODE: {other} (expected dashboard or device)"),
    };

    let variant = match lookup("DASHBOARD_VARIANT").as_deref().map(str::to_lowercase).as_deref() {
        None | Some("local") => Variant::Local,
        Some("remote") => Variant::Remote {
            device_url: require_env!(lookup, "DEVICE_URL"),
        },
        Some(other) => bail!("Invalid DASHBOARD_VARIANT: {other} (expected local or remote)"),
    };

    let listen_port = parse_env_u32!(lookup, "LISTEN_PORT", 8080);
    let listen_port =
        u16::try_from(listen_port).map_err(|_| anyhow!("Invalid LISTEN_PORT: {listen_port}"))?;

    let poll_interval_secs = parse_env_u32!(lookup, "POLL_INTERVAL_SECS", 3);
    if poll_interval_secs == 0 {
        bail!("POLL_INTERVAL_SECS must be at least 1");
    }
    let http_timeout_secs = parse_env_u32!(lookup, "HTTP_TIMEOUT_SECS", 10);
    let history_retention_days = parse_env_u32!(lookup, "HISTORY_RETENTION_DAYS", 30);
    let history_dir = lookup("HISTORY_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"));

    Ok(Config {
        mode,
        variant,
        listen_port,
        poll_interval: Duration::from_secs(u64::from(poll_interval_secs)),
        http_timeout: Duration::from_secs(u64::from(http_timeout_secs)),
        history_dir,
        history_retention_days,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        let variant = match &self.variant {
            Variant::Local => "local".to_string(),
            Variant::Remote { device_url } => format!("remote ({device_url})"),
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  APP_MODE               : {:?}", self.mode);
        tracing::info!("  DASHBOARD_VARIANT      : {}", variant);
        tracing::info!("  LISTEN_PORT            : {}", self.listen_port);
        tracing::info!("  POLL_INTERVAL_SECS     : {}", self.poll_interval.as_secs());
        tracing::info!("  HTTP_TIMEOUT_SECS      : {}", self.http_timeout.as_secs());
        tracing::info!("  HISTORY_DIR            : {}", self.history_dir.display());
        tracing::info!("  HISTORY_RETENTION_DAYS : {}", self.history_retention_days);
    }
}
