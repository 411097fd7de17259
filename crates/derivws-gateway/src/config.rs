/*
[INPUT]:  Optional YAML configuration file
[OUTPUT]: Parsed gateway configuration with defaults applied
[POS]:    Configuration layer - listener, upstream and formatting options
[UPDATE]: When adding new configuration options
*/

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use derivws_adapter::{
    ClientConfig, EndpointTimeouts, MarketDataService, ResponseFormatter,
    ws::{DEFAULT_APP_ID, DEFAULT_ENDPOINT},
};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// HTTP listen address
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Upstream WebSocket settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Timestamp rendering
    #[serde(default)]
    pub display: DisplayConfig,
    /// Query parameter defaults for the candle endpoint
    #[serde(default)]
    pub candles: CandleDefaults,
}

/// Upstream WebSocket API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_time_timeout_ms")]
    pub time_timeout_ms: u64,
    #[serde(default = "default_candles_timeout_ms")]
    pub candles_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Offset east of UTC used for formatted times
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandleDefaults {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upstream: UpstreamConfig::default(),
            display: DisplayConfig::default(),
            candles: CandleDefaults::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            app_id: default_app_id(),
            connect_timeout_ms: default_connect_timeout_ms(),
            time_timeout_ms: default_time_timeout_ms(),
            candles_timeout_ms: default_candles_timeout_ms(),
        }
    }
}

impl Default for CandleDefaults {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            count: default_count(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_time_timeout_ms() -> u64 {
    5_000
}

fn default_candles_timeout_ms() -> u64 {
    10_000
}

fn default_symbol() -> String {
    "R_50".to_string()
}

fn default_count() -> u32 {
    10
}

impl GatewayConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.upstream.endpoint.clone(),
            app_id: self.upstream.app_id.clone(),
            connect_timeout: Duration::from_millis(self.upstream.connect_timeout_ms),
        }
    }

    pub fn timeouts(&self) -> EndpointTimeouts {
        EndpointTimeouts {
            server_time: Duration::from_millis(self.upstream.time_timeout_ms),
            candle_history: Duration::from_millis(self.upstream.candles_timeout_ms),
        }
    }

    /// Build the market data service described by this configuration.
    pub fn build_service(&self) -> Result<MarketDataService> {
        let formatter = ResponseFormatter::from_offset_minutes(self.display.utc_offset_minutes)
            .context("display.utc_offset_minutes")?;
        let service = MarketDataService::new(self.client_config())
            .context("upstream configuration")?
            .with_formatter(formatter)
            .with_timeouts(self.timeouts());
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: GatewayConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen, default_listen());
        assert_eq!(config.upstream.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.upstream.candles_timeout_ms, 10_000);
        assert_eq!(config.candles.symbol, "R_50");
        assert_eq!(config.candles.count, 10);
        assert_eq!(config.display.utc_offset_minutes, 0);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
listen: "0.0.0.0:8080"
upstream:
  app_id: "4242"
  time_timeout_ms: 2500
display:
  utc_offset_minutes: 420
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.upstream.app_id, "4242");
        assert_eq!(config.upstream.connect_timeout_ms, 5_000);
        assert_eq!(config.timeouts().server_time, Duration::from_millis(2500));
        assert_eq!(config.timeouts().candle_history, Duration::from_millis(10_000));
        assert_eq!(config.client_config().connect_timeout, Duration::from_millis(5_000));
        assert_eq!(config.display.utc_offset_minutes, 420);
    }

    #[test]
    fn test_build_service() {
        let config = GatewayConfig::default();
        let service = assert_ok!(config.build_service());
        assert_eq!(
            service.factory().url().as_str(),
            "wss://ws.derivws.com/websockets/v3?app_id=1089"
        );
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let mut config = GatewayConfig::default();
        config.display.utc_offset_minutes = 24 * 60;
        assert_err!(config.build_service());
    }
}
