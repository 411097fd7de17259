/*
[INPUT]:  Raw JSON replies, display UTC offset, current wall clock
[OUTPUT]: ServerTimeReport / CandleHistoryReport or a typed reply failure
[POS]:    Formatting layer - reply normalization for the endpoints
[UPDATE]: When endpoint shapes or timestamp rendering change
*/

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DerivError, RequestError, Result};
use crate::types::{
    ApiErrorBody, Candle, CandleHistoryReport, CandlesReply, FormattedCandle, ServerTimeReport,
    TimeReply,
};

const CLOCK_FORMAT: &str = "%H:%M:%S";
const CANDLE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Maps raw replies into endpoint JSON, rendering timestamps at a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct ResponseFormatter {
    offset: FixedOffset,
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::utc()
    }
}

impl ResponseFormatter {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Offset east of UTC in minutes; must lie strictly within ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::with_offset)
            .ok_or_else(|| DerivError::Config(format!("invalid UTC offset: {minutes} minutes")))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Format a `time` reply; `now` feeds the `local_time` field.
    pub fn server_time(
        &self,
        reply: &Value,
        now: DateTime<Utc>,
    ) -> std::result::Result<ServerTimeReport, RequestError> {
        check_api_error(reply)?;

        let server_time = TimeReply::deserialize(reply)
            .map_err(|_| malformed("time", reply))?
            .time;
        let at = self.at_offset(server_time).ok_or_else(|| malformed("time", reply))?;

        let fractional = f64::from(at.nanosecond()) / 1_000_000_000.0;
        let seconds_to_next_minute = 60.0 - f64::from(at.second()) - fractional;

        Ok(ServerTimeReport {
            success: true,
            server_time,
            formatted_time: at.format(CLOCK_FORMAT).to_string(),
            seconds_to_next_minute: round_2dp(seconds_to_next_minute),
            local_time: now.with_timezone(&self.offset).format(CLOCK_FORMAT).to_string(),
        })
    }

    /// Format a `candles` reply for `symbol`.
    pub fn candle_history(
        &self,
        symbol: &str,
        reply: &Value,
    ) -> std::result::Result<CandleHistoryReport, RequestError> {
        check_api_error(reply)?;

        let candles = CandlesReply::deserialize(reply)
            .map_err(|_| malformed("candles", reply))?
            .candles
            .into_iter()
            .map(|candle| self.format_candle(candle))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| malformed("candles", reply))?;

        Ok(CandleHistoryReport {
            success: true,
            symbol: symbol.to_string(),
            count: candles.len(),
            latest_candle: candles.last().cloned(),
            candles,
        })
    }

    fn format_candle(&self, candle: Candle) -> Option<FormattedCandle> {
        let at = self.at_offset(candle.epoch)?;
        Some(FormattedCandle {
            time: at.format(CANDLE_TIME_FORMAT).to_string(),
            epoch: candle.epoch,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
        })
    }

    fn at_offset(&self, epoch: i64) -> Option<DateTime<FixedOffset>> {
        DateTime::from_timestamp(epoch, 0).map(|at| at.with_timezone(&self.offset))
    }
}

fn check_api_error(reply: &Value) -> std::result::Result<(), RequestError> {
    let Some(error) = reply.get("error") else {
        return Ok(());
    };
    match serde_json::from_value::<ApiErrorBody>(error.clone()) {
        Ok(body) => Err(RequestError::Api {
            code: body.code,
            message: body.message,
        }),
        Err(_) => Err(RequestError::Api {
            code: "Unknown".to_string(),
            message: error.to_string(),
        }),
    }
}

fn malformed(expected: &'static str, reply: &Value) -> RequestError {
    RequestError::MalformedReply {
        expected,
        reply: reply.clone(),
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
