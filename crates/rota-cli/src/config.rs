//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rota_client::{ApiError, RotaClient};
use rota_core::{AggregatorConfig, ClassifierConfig};
use rota_live::SyncTuning;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root URL of the rota API.
    pub api_base_url: String,

    /// Bearer token sent with every request.
    pub api_token: Option<String>,

    pub request_timeout_secs: u64,

    /// Minutes after the scheduled start before a clock-on counts as late.
    pub grace_minutes: i64,

    /// Width of the start-time buckets on the board.
    pub bucket_minutes: u16,

    pub debounce_ms: u64,
    pub poll_interval_secs: u64,
    pub loading_delay_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("grace_minutes", &self.grace_minutes)
            .field("bucket_minutes", &self.bucket_minutes)
            .field("debounce_ms", &self.debounce_ms)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("loading_delay_ms", &self.loading_delay_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let classifier = ClassifierConfig::default();
        let aggregator = AggregatorConfig::default();
        let tuning = SyncTuning::default();
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_token: None,
            request_timeout_secs: rota_client::DEFAULT_TIMEOUT.as_secs(),
            grace_minutes: classifier.grace_minutes,
            bucket_minutes: aggregator.bucket_minutes,
            debounce_ms: duration_millis(tuning.debounce),
            poll_interval_secs: tuning.poll_interval.as_secs(),
            loading_delay_ms: duration_millis(tuning.loading_delay),
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ROTA_*)
        figment = figment.merge(Env::prefixed("ROTA_"));

        figment.extract()
    }

    pub fn client(&self) -> Result<RotaClient, ApiError> {
        RotaClient::new(
            &self.api_base_url,
            self.api_token.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )
    }

    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            bucket_minutes: self.bucket_minutes,
            classifier: ClassifierConfig {
                grace_minutes: self.grace_minutes,
                ..ClassifierConfig::default()
            },
        }
    }

    pub const fn tuning(&self) -> SyncTuning {
        SyncTuning {
            debounce: Duration::from_millis(self.debounce_ms),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            loading_delay: Duration::from_millis(self.loading_delay_ms),
        }
    }
}

/// Returns the platform-specific config directory for rota.
///
/// On Linux: `~/.config/rota`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rota"))
}
