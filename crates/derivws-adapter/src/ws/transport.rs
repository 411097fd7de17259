/*
[INPUT]:  WebSocket URL, connect timeout, inbound sink
[OUTPUT]: One open socket with send/close and inbound delivery to the sink
[POS]:    WebSocket layer - physical connection lifecycle
[UPDATE]: When changing connect classification, frame handling or close semantics
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, info};
use url::Url;

use crate::error::{ConnectError, SendError};
use crate::ws::correlator::InboundSink;
use crate::ws::message::{Decoded, decode_frame};

const OUTBOUND_CHANNEL_CAPACITY: usize = 100;
const CLOSE_GRACE: Duration = Duration::from_secs(1);
const MALFORMED_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static MALFORMED_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Lifecycle of one physical socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// An open WebSocket connection driven by a background task.
///
/// Dropping the transport drops the outbound sender, which makes the driver
/// send a Close frame and exit.
pub struct Transport {
    outbound_tx: Mutex<Option<mpsc::Sender<WsMessage>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    sink: Arc<dyn InboundSink>,
    created_at: Instant,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Transport {
    /// Open a socket to `url`, failing if the handshake is not done within `timeout`.
    pub async fn connect(
        url: &Url,
        timeout: Duration,
        sink: Arc<dyn InboundSink>,
    ) -> Result<Self, ConnectError> {
        let created_at = Instant::now();
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state_tx = Arc::new(state_tx);

        let handshake = tokio::time::timeout(timeout, connect_async(url.as_str())).await;
        let ws_stream = match handshake {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(err)) => {
                state_tx.send_replace(ConnectionState::Closed);
                return Err(classify_connect_error(err));
            }
            Err(_) => {
                state_tx.send_replace(ConnectionState::Closed);
                return Err(ConnectError::TimedOut { after: timeout });
            }
        };

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<WsMessage>(OUTBOUND_CHANNEL_CAPACITY);
        state_tx.send_replace(ConnectionState::Open);
        info!(
            host = url.host_str().unwrap_or_default(),
            elapsed_ms = created_at.elapsed().as_millis() as u64,
            "ws connected"
        );

        let driver_sink = Arc::clone(&sink);
        let driver_state = Arc::clone(&state_tx);
        let driver = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(message) => {
                                if let Err(err) = write.send(message).await {
                                    debug!(error = %err, "ws write failed");
                                    break;
                                }
                            }
                            None => {
                                driver_state.send_replace(ConnectionState::Closing);
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Close(frame))) => {
                                debug!(frame = ?frame, "ws closed by peer");
                                driver_state.send_replace(ConnectionState::Closing);
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                            Some(Ok(message)) => match decode_frame(message) {
                                Decoded::Message(parsed) => driver_sink.on_message(parsed),
                                Decoded::Control => {}
                                Decoded::Malformed { error, raw } => {
                                    log_malformed_once(&error, &raw);
                                }
                            },
                            Some(Err(err)) => {
                                debug!(error = %err, "ws read failed");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            driver_state.send_replace(ConnectionState::Closed);
            driver_sink.on_connection_closed();
        });

        Ok(Self {
            outbound_tx: Mutex::new(Some(outbound_tx)),
            state_tx,
            driver: Mutex::new(Some(driver)),
            sink,
            created_at,
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Queue one text frame for the socket.
    pub async fn send(&self, text: String) -> Result<(), SendError> {
        if self.state() != ConnectionState::Open {
            return Err(SendError::NotOpen);
        }

        let sender = {
            let guard = self.outbound_tx.lock().await;
            guard.clone().ok_or(SendError::NotOpen)?
        };

        sender
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|_| SendError::NotOpen)
    }

    /// Close the socket and wait briefly for the driver to finish.
    ///
    /// Idempotent; pending requests on the sink are failed before this returns.
    pub async fn close(&self) {
        // Dropping the last sender makes the driver emit a Close frame and exit.
        let sender = self.outbound_tx.lock().await.take();
        if sender.is_some() && self.state() == ConnectionState::Open {
            self.state_tx.send_replace(ConnectionState::Closing);
        }
        drop(sender);

        let driver = self.driver.lock().await.take();
        if let Some(mut driver) = driver {
            if tokio::time::timeout(CLOSE_GRACE, &mut driver).await.is_err() {
                debug!("ws driver did not stop in time; aborting");
                driver.abort();
            }
        }

        self.state_tx.send_replace(ConnectionState::Closed);
        self.sink.on_connection_closed();
    }
}

fn classify_connect_error(err: tungstenite::Error) -> ConnectError {
    match err {
        tungstenite::Error::Io(io) => ConnectError::Refused(io.to_string()),
        other => ConnectError::Protocol(other.to_string()),
    }
}

fn log_malformed_once(error: &str, raw: &str) {
    let count = MALFORMED_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < MALFORMED_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = MALFORMED_LOG_LIMIT,
            error,
            bytes = raw.len(),
            "ws frame dropped"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = MALFORMED_LOG_LIMIT,
            error,
            bytes = raw.len(),
            message = %preview,
            "ws frame dropped"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
