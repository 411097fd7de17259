/*
[INPUT]:  Endpoint parameters (symbol, count)
[OUTPUT]: Serializable request payloads for the WebSocket API
[POS]:    Data layer - outbound request shapes
[UPDATE]: When request fields change
*/

use serde::{Deserialize, Serialize};

/// Candle width used by the history endpoint, in seconds
pub const CANDLE_GRANULARITY_SECS: u32 = 60;

/// `{"time": 1}` server time request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRequest {
    pub time: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<u64>,
}

impl Default for TimeRequest {
    fn default() -> Self {
        Self {
            time: 1,
            req_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStyle {
    Candles,
}

/// `ticks_history` request returning the latest `count` candles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicksHistoryRequest {
    pub ticks_history: String,
    pub adjust_start_time: u8,
    pub count: u32,
    pub end: String,
    pub start: u64,
    pub style: HistoryStyle,
    pub granularity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<u64>,
}

impl TicksHistoryRequest {
    pub fn latest_candles(symbol: impl Into<String>, count: u32) -> Self {
        Self {
            ticks_history: symbol.into(),
            adjust_start_time: 1,
            count,
            end: "latest".to_string(),
            start: 1,
            style: HistoryStyle::Candles,
            granularity: CANDLE_GRANULARITY_SECS,
            req_id: None,
        }
    }

    pub fn with_req_id(mut self, req_id: u64) -> Self {
        self.req_id = Some(req_id);
        self
    }
}
