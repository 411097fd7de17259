/*
[INPUT]:  Client factory, formatter, endpoint parameters
[OUTPUT]: Formatted server time / candle history reports
[POS]:    Service layer - one connection per call, closed on every path
[UPDATE]: When adding endpoints or changing per-endpoint timeouts
*/

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DerivError, Result};
use crate::format::ResponseFormatter;
use crate::types::{CandleHistoryReport, ServerTimeReport, TicksHistoryRequest, TimeRequest};
use crate::ws::{ClientConfig, ClientFactory};

/// Per-endpoint reply timeouts
#[derive(Debug, Clone, Copy)]
pub struct EndpointTimeouts {
    pub server_time: Duration,
    pub candle_history: Duration,
}

impl Default for EndpointTimeouts {
    fn default() -> Self {
        Self {
            server_time: Duration::from_secs(5),
            candle_history: Duration::from_secs(10),
        }
    }
}

/// Stateless market data calls; each call opens and closes its own socket.
#[derive(Debug, Clone)]
pub struct MarketDataService {
    factory: ClientFactory,
    formatter: ResponseFormatter,
    timeouts: EndpointTimeouts,
}

impl MarketDataService {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            factory: ClientFactory::new(config)?,
            formatter: ResponseFormatter::utc(),
            timeouts: EndpointTimeouts::default(),
        })
    }

    pub fn with_formatter(mut self, formatter: ResponseFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_timeouts(mut self, timeouts: EndpointTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn factory(&self) -> &ClientFactory {
        &self.factory
    }

    /// Current server time, formatted.
    pub async fn server_time(&self) -> Result<ServerTimeReport> {
        let reply = self
            .round_trip(&TimeRequest::default(), self.timeouts.server_time)
            .await?;
        let report = self.formatter.server_time(&reply, Utc::now())?;
        info!(server_time = report.server_time, "server time fetched");
        Ok(report)
    }

    /// Latest `count` one-minute candles for `symbol`, formatted.
    pub async fn candle_history(&self, symbol: &str, count: u32) -> Result<CandleHistoryReport> {
        let request = TicksHistoryRequest::latest_candles(symbol, count);
        let reply = self
            .round_trip(&request, self.timeouts.candle_history)
            .await?;
        let report = self.formatter.candle_history(symbol, &reply)?;
        info!(symbol, count = report.count, "candle history fetched");
        Ok(report)
    }

    /// Connect, send one request, and close regardless of the outcome.
    async fn round_trip<P: Serialize + Sync>(&self, payload: &P, timeout: Duration) -> Result<Value> {
        let client = self.factory.create();

        let result = async {
            client.connect(self.factory.config().connect_timeout).await?;
            Ok::<Value, DerivError>(client.request(payload, timeout).await?)
        }
        .await;

        client.close().await;
        if let Err(err) = &result {
            debug!(url = %client.url(), error = %err, "round trip failed");
        }
        result
    }
}
