// =============================================================================
// Runtime Configuration — server, exchange and credential settings
// =============================================================================
//
// Non-secret settings live in an optional JSON file. All fields carry a serde
// default so that a partial (or missing) file still yields a usable config.
// API credentials are read from the process environment only and never
// written to disk or logged.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Path of the alert route served by the webhook router.
pub const ALERT_PATH: &str = "/tradingview/meanreversion";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_quote_currency() -> String {
    "USDT".to_string()
}

fn default_base_url() -> String {
    "https://contract.mexc.com".to_string()
}

fn default_recv_window_ms() -> u64 {
    5000
}

fn default_min_request_interval_ms() -> u64 {
    50
}

fn default_request_timeout_secs() -> u64 {
    10
}

// =============================================================================
// MarginMode
// =============================================================================

/// Margin mode sent with every order (`openType` on MEXC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    #[default]
    Isolated,
    Cross,
}

impl MarginMode {
    /// Numeric code used by the MEXC contract API.
    pub fn code(self) -> u8 {
        match self {
            Self::Isolated => 1,
            Self::Cross => 2,
        }
    }
}

impl std::fmt::Display for MarginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Isolated => write!(f, "isolated"),
            Self::Cross => write!(f, "cross"),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- HTTP server ---------------------------------------------------------

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    // --- Symbols -------------------------------------------------------------

    /// Quote currency stripped from a tradable symbol to obtain the bare
    /// crypto name ("BTCUSDT" -> "BTC").
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,

    // --- Exchange ------------------------------------------------------------

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Recv-window sent with every signed request (milliseconds).
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,

    /// Also accepted as `open_type`, MEXC's name for the same setting.
    #[serde(default, alias = "open_type")]
    pub margin_mode: MarginMode,

    /// Minimum spacing between two exchange requests (milliseconds).
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // --- Startup -------------------------------------------------------------

    /// Mark symbols with an open exchange position as in-trade at startup.
    /// Off by default: a fresh process answers every alert with
    /// `NoActiveTrade` until upstream marks a trade.
    #[serde(default)]
    pub adopt_open_positions: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            quote_currency: default_quote_currency(),
            base_url: default_base_url(),
            recv_window_ms: default_recv_window_ms(),
            margin_mode: MarginMode::default(),
            min_request_interval_ms: default_min_request_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            adopt_open_positions: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            port = config.port,
            quote_currency = %config.quote_currency,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// API credentials for the exchange account.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
}

impl Credentials {
    /// Read `API_KEY` and `SECRET` from the environment. Both are required.
    pub fn from_env() -> Result<Self> {
        let api_key = required_env("API_KEY")?;
        let secret = required_env("SECRET")?;
        Ok(Self { api_key, secret })
    }
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("environment variable {name} is not set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("environment variable {name} is empty");
    }
    Ok(value)
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}
