/*
[INPUT]:  Formatted reply data
[OUTPUT]: JSON bodies returned by the HTTP endpoints
[POS]:    Data layer - endpoint result shapes
[UPDATE]: When endpoint response fields change
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of a successful server time call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerTimeReport {
    pub success: bool,
    pub server_time: i64,
    /// `HH:MM:SS` at the display offset
    pub formatted_time: String,
    /// Rounded to two decimals
    pub seconds_to_next_minute: f64,
    pub local_time: String,
}

/// One candle with a human-readable timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedCandle {
    /// `YYYY-MM-DD HH:MM:SS` at the display offset
    pub time: String,
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

/// Body of a successful candle history call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleHistoryReport {
    pub success: bool,
    pub symbol: String,
    pub count: usize,
    pub candles: Vec<FormattedCandle>,
    pub latest_candle: Option<FormattedCandle>,
}
