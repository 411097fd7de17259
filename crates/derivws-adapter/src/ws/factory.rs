/*
[INPUT]:  Endpoint, application id and timeouts
[OUTPUT]: Fresh RequestClient instances sharing one monotonic id generator
[POS]:    WebSocket layer - client construction
[UPDATE]: When adding connection options or changing the URL format
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use url::Url;

use crate::error::{DerivError, Result};
use crate::ws::client::RequestClient;

/// Public Deriv WebSocket endpoint
pub const DEFAULT_ENDPOINT: &str = "wss://ws.derivws.com/websockets/v3";
/// Anonymous application id accepted for public calls
pub const DEFAULT_APP_ID: &str = "1089";

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub app_id: String,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: DEFAULT_APP_ID.to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Endpoint URL with the `app_id` query parameter applied.
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(DerivError::Config(format!(
                    "endpoint scheme must be ws or wss, got {other}"
                )));
            }
        }
        if !self.app_id.is_empty() {
            url.query_pairs_mut().append_pair("app_id", &self.app_id);
        }
        Ok(url)
    }
}

/// Monotonic `req_id` source.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdGenerator {
    /// Ids start at 1; the API treats 0 as absent.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Creates one `RequestClient` per invocation.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    config: ClientConfig,
    url: Url,
    ids: Arc<RequestIdGenerator>,
}

impl ClientFactory {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let url = config.url()?;
        Ok(Self {
            config,
            url,
            ids: Arc::new(RequestIdGenerator::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn create(&self) -> RequestClient {
        RequestClient::new(self.url.clone(), Arc::clone(&self.ids))
    }
}
