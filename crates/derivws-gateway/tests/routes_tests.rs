/*
[INPUT]:  HTTP requests against the router backed by a fake WebSocket API
[OUTPUT]: Endpoint status, body and CORS verification
[POS]:    Integration tests - HTTP gateway
[UPDATE]: When endpoints or error rendering change
*/

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use derivws_gateway::config::{GatewayConfig, UpstreamConfig};
use derivws_gateway::{AppState, create_router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Start a fake upstream answering `time` and `ticks_history` requests
async fn start_fake_upstream(candles: Option<Value>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let candles = candles.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(Message::Text(text))) = ws.next().await {
                    let request: Value = serde_json::from_str(text.as_str()).unwrap();
                    let reply = if request.get("time").is_some() {
                        json!({ "time": 1700000000, "req_id": request["req_id"] })
                    } else {
                        match &candles {
                            Some(candles) => {
                                json!({ "candles": candles, "req_id": request["req_id"] })
                            }
                            None => json!({ "msg_type": "history", "req_id": request["req_id"] }),
                        }
                    };
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    addr
}

fn app_for(upstream: SocketAddr) -> Router {
    let config = GatewayConfig {
        upstream: UpstreamConfig {
            endpoint: format!("ws://{upstream}/websockets/v3"),
            ..UpstreamConfig::default()
        },
        ..GatewayConfig::default()
    };
    let service = config.build_service().unwrap();
    create_router(Arc::new(AppState::new(service, config.candles.clone())))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let allow_origin = response
        .headers()
        .get("access-control-allow-origin")
        .map(|value| value.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, allow_origin, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_server_time_endpoint() {
    let upstream = start_fake_upstream(None).await;
    let (status, allow_origin, body) = get(app_for(upstream), "/api/server-time").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(allow_origin.as_deref(), Some("*"));
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["server_time"], json!(1700000000));
    assert_eq!(body["formatted_time"], json!("22:13:20"));
    assert_eq!(body["seconds_to_next_minute"], json!(40.0));
    assert!(body["local_time"].is_string());
}

#[tokio::test]
async fn test_candle_history_endpoint() {
    let candles = json!([
        { "epoch": 1700000000, "open": 1, "high": 2, "low": 0.5, "close": 1.5 }
    ]);
    let upstream = start_fake_upstream(Some(candles)).await;
    let (status, _, body) = get(
        app_for(upstream),
        "/api/candle-history?symbol=R_100&count=1",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["symbol"], json!("R_100"));
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["latest_candle"], body["candles"][0]);
    assert_eq!(body["candles"][0]["time"], json!("2023-11-14 22:13:20"));
    assert_eq!(body["candles"][0]["low"], json!(0.5));
}

#[tokio::test]
async fn test_candle_history_defaults() {
    let upstream = start_fake_upstream(Some(json!([]))).await;
    let (status, _, body) = get(app_for(upstream), "/api/candle-history").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], json!("R_50"));
    assert_eq!(body["count"], json!(0));
    assert_eq!(body["latest_candle"], Value::Null);
}

#[tokio::test]
async fn test_candle_history_malformed_reply() {
    let upstream = start_fake_upstream(None).await;
    let (status, _, body) = get(app_for(upstream), "/api/candle-history").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("reply is missing `candles`"));
    assert_eq!(body["response"]["msg_type"], json!("history"));
}

#[tokio::test]
async fn test_invalid_count_rejected() {
    let upstream = start_fake_upstream(None).await;
    let (status, allow_origin, body) =
        get(app_for(upstream), "/api/candle-history?count=ten").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(allow_origin.as_deref(), Some("*"));
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("invalid count: ten"));
}

#[tokio::test]
async fn test_upstream_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (status, _, body) = get(app_for(addr), "/api/server-time").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().starts_with("connection refused"));
}
