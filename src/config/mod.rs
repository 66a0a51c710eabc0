use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::scheduler::RefreshPolicy;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub quotes: QuoteSourceConfig,
    #[serde(default)]
    pub forecast: ForecastSourceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Serve quotes from the built-in sample table instead of HTTP.
    #[serde(default)]
    pub offline: bool,
}

/// Quote endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteSourceConfig {
    #[serde(default = "default_quote_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

/// Prediction service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastSourceConfig {
    #[serde(default = "default_forecast_url")]
    pub base_url: String,

    #[serde(default = "default_forecast_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Poll cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// 0 disables back-off after transport failures.
    #[serde(default)]
    pub backoff_max_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl SchedulerConfig {
    pub fn policy(&self) -> RefreshPolicy {
        RefreshPolicy::fixed(Duration::from_millis(self.interval_ms)).with_backoff(
            Duration::from_millis(self.backoff_max_ms),
            Duration::from_millis(self.jitter_ms),
        )
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_quote_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_forecast_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_forecast_timeout_secs() -> u64 {
    60
}
fn default_user_agent() -> String {
    "market-pulse/0.1 (dashboard data core)".to_string()
}
fn default_symbols() -> Vec<String> {
    vec!["NIFTY 50".into(), "SENSEX".into(), "BANK NIFTY".into()]
}
fn default_interval_ms() -> u64 {
    5000
}
fn default_jitter_ms() -> u64 {
    250
}

impl Default for QuoteSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_quote_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            symbols: default_symbols(),
        }
    }
}

impl Default for ForecastSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_url(),
            timeout_secs: default_forecast_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            backoff_max_ms: 0,
            jitter_ms: default_jitter_ms(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("quotes.symbols")
                    .try_parsing(true),
            )
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|e| {
            warn!("Invalid configuration ({}), using defaults", e);
            AppConfig::default()
        });

        if app_cfg.scheduler.interval_ms == 0 {
            anyhow::bail!("scheduler.interval_ms must be greater than zero");
        }
        Ok(app_cfg)
    }
}
