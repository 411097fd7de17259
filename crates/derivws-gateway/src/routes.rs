/*
[INPUT]:  HTTP GET requests with query parameters
[OUTPUT]: JSON endpoint bodies with permissive CORS headers
[POS]:    HTTP layer - thin adapter over MarketDataService
[UPDATE]: When adding endpoints or changing error rendering
*/

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use derivws_adapter::{DerivError, MarketDataService};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::CandleDefaults;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    pub service: MarketDataService,
    pub candle_defaults: CandleDefaults,
}

impl AppState {
    pub fn new(service: MarketDataService, candle_defaults: CandleDefaults) -> Self {
        Self {
            service,
            candle_defaults,
        }
    }
}

/// Create the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/server-time", get(server_time))
        .route("/api/candle-history", get(candle_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Endpoint failure rendered as `{"success": false, ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "success": false, "error": message.into() }),
        }
    }

    /// Upstream failures are reported in-band with a 200 status.
    pub fn upstream(err: &DerivError) -> Self {
        let mut body = json!({ "success": false, "error": err.to_string() });
        if let Some(reply) = err.malformed_reply() {
            body["response"] = reply.clone();
        }
        ApiError {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn server_time(State(state): State<Arc<AppState>>) -> Response {
    match state.service.server_time().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            warn!(error = %err, "server time failed");
            ApiError::upstream(&err).into_response()
        }
    }
}

async fn candle_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let symbol = params
        .get("symbol")
        .cloned()
        .unwrap_or_else(|| state.candle_defaults.symbol.clone());
    let count = match params.get("count") {
        Some(raw) => match raw.parse::<u32>() {
            Ok(count) => count,
            Err(_) => {
                return ApiError::bad_request(format!("invalid count: {raw}")).into_response();
            }
        },
        None => state.candle_defaults.count,
    };

    match state.service.candle_history(&symbol, count).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            warn!(symbol = %symbol, error = %err, "candle history failed");
            ApiError::upstream(&err).into_response()
        }
    }
}
