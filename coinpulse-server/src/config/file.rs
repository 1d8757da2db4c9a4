//! TOML file configuration structures.
//!
//! These structs directly map to the `coinpulse.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
///
/// Every section except `[assets]` can be omitted and falls back to its
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    pub assets: AssetsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// api process section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// The address and port the api process listens on.
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_api_listen(),
        }
    }
}

fn default_api_listen() -> SocketAddr {
    "0.0.0.0:3000".parse().expect("valid default address")
}

/// worker process section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// The address and port the worker health endpoint listens on.
    #[serde(default = "default_worker_listen")]
    pub listen: SocketAddr,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen: default_worker_listen(),
        }
    }
}

fn default_worker_listen() -> SocketAddr {
    "0.0.0.0:3001".parse().expect("valid default address")
}

/// Event bus section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// NATS server address.
    #[serde(default = "default_bus_url")]
    pub url: String,
    /// Seconds between connection attempts while the bus is unreachable.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

fn default_bus_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

/// Market-data provider section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the market-data API.
    #[serde(default = "default_provider_base_url")]
    pub base_url: Url,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
        }
    }
}

fn default_provider_base_url() -> Url {
    "https://api.coingecko.com/api/v3"
        .parse()
        .expect("valid default URL")
}

/// Tracked asset catalogue section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Provider ids of the tracked assets (e.g. "bitcoin").
    pub tracked: Vec<String>,
}

/// Refresh schedule section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds-resolution cron expression for the refresh trigger.
    #[serde(default = "default_cron")]
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
        }
    }
}

fn default_cron() -> String {
    "0 */15 * * * *".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[assets]
tracked = ["bitcoin", "ethereum"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.listen.port(), 3000);
        assert_eq!(config.worker.listen.port(), 3001);
        assert_eq!(config.bus.url, "nats://127.0.0.1:4222");
        assert_eq!(config.bus.reconnect_delay_secs, 5);
        assert_eq!(
            config.provider.base_url.as_str(),
            "https://api.coingecko.com/api/v3"
        );
        assert_eq!(config.schedule.cron, "0 */15 * * * *");
        assert_eq!(config.assets.tracked, vec!["bitcoin", "ethereum"]);
    }

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[api]
listen = "127.0.0.1:8080"

[worker]
listen = "127.0.0.1:8081"

[bus]
url = "nats://bus.internal:4222"
reconnect_delay_secs = 2

[provider]
base_url = "https://coingecko.proxy.internal/api/v3"

[assets]
tracked = ["bitcoin", "ethereum", "matic-network"]

[schedule]
cron = "0 0 * * * *"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.listen.port(), 8080);
        assert_eq!(config.worker.listen.port(), 8081);
        assert_eq!(config.bus.url, "nats://bus.internal:4222");
        assert_eq!(config.bus.reconnect_delay_secs, 2);
        assert_eq!(config.assets.tracked.len(), 3);
        assert_eq!(config.schedule.cron, "0 0 * * * *");
    }

    #[test]
    fn test_missing_assets_section_rejected() {
        let toml_str = r#"
[api]
listen = "127.0.0.1:8080"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
