/*
[INPUT]:  Raw JSON replies from the WebSocket API
[OUTPUT]: Typed reply structs
[POS]:    Data layer - inbound reply shapes
[UPDATE]: When API reply schema changes
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error object the API returns instead of the requested field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

/// Server time reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeReply {
    pub time: i64,
    #[serde(default)]
    pub req_id: Option<u64>,
}

/// One OHLC candle. Prices may arrive as JSON numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub epoch: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub open: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub high: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub low: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub close: Decimal,
}

/// Candle history reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlesReply {
    pub candles: Vec<Candle>,
    #[serde(default)]
    pub req_id: Option<u64>,
}
