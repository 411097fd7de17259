/*
[INPUT]:  Test scenarios needing a WebSocket peer
[OUTPUT]: Local fake API servers with scripted reply behavior
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new server behaviors
*/

//! Common test utilities for derivws-adapter tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Builds the frames sent back for one request
pub type Responder = Arc<dyn Fn(&Value) -> Vec<Message> + Send + Sync>;

#[derive(Clone)]
pub enum Mode {
    /// Reply to each request as it arrives
    Respond(Responder),
    /// Hold replies until `size` requests arrived, then send them in random order
    ShuffledBatch { size: usize, responder: Responder },
    /// Read requests, never reply
    Silent,
    /// Send a Close frame as soon as the first request arrives
    CloseOnFirstRequest,
}

pub struct FakeServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
}

impl FakeServer {
    pub fn url(&self) -> String {
        format!("ws://{}/websockets/v3", self.addr)
    }

    /// Requests seen so far, in arrival order
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

pub async fn spawn_server(mode: Mode) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));

    let server_received = Arc::clone(&received);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, mode.clone(), Arc::clone(&server_received)));
        }
    });

    FakeServer { addr, received }
}

async fn serve_connection(stream: TcpStream, mode: Mode, received: Arc<Mutex<Vec<Value>>>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    let mut held: Vec<Message> = Vec::new();

    while let Some(Ok(message)) = ws.next().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        received.lock().unwrap().push(request.clone());

        match &mode {
            Mode::Respond(responder) => {
                for frame in responder(&request) {
                    if ws.send(frame).await.is_err() {
                        return;
                    }
                }
            }
            Mode::ShuffledBatch { size, responder } => {
                held.extend(responder(&request));
                if received.lock().unwrap().len() >= *size {
                    held.shuffle(&mut rand::thread_rng());
                    for frame in held.drain(..) {
                        if ws.send(frame).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Mode::Silent => {}
            Mode::CloseOnFirstRequest => {
                let _ = ws.close(None).await;
                return;
            }
        }
    }
}

/// Accepts TCP connections but never completes the WebSocket handshake
pub async fn spawn_stalled_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// Address with nothing listening on it
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

/// Echo the request's `req_id` and `echo` fields back
pub fn echo_responder() -> Responder {
    Arc::new(|request: &Value| {
        vec![text(json!({
            "req_id": request["req_id"],
            "echo": request.get("echo").cloned().unwrap_or(Value::Null),
        }))]
    })
}

/// Answer `time` requests with a fixed epoch
pub fn time_responder(epoch: i64) -> Responder {
    Arc::new(move |request: &Value| {
        vec![text(json!({
            "echo_req": request,
            "msg_type": "time",
            "req_id": request["req_id"],
            "time": epoch,
        }))]
    })
}

/// Answer `ticks_history` requests with the given candles
pub fn candles_responder(candles: Value) -> Responder {
    Arc::new(move |request: &Value| {
        vec![text(json!({
            "candles": candles,
            "echo_req": request,
            "msg_type": "candles",
            "req_id": request["req_id"],
        }))]
    })
}

/// Reply with a fixed body plus the request's `req_id`
pub fn fixed_responder(body: Value) -> Responder {
    Arc::new(move |request: &Value| {
        let mut reply = body.clone();
        reply["req_id"] = request["req_id"].clone();
        vec![text(reply)]
    })
}
