/*
[INPUT]:  WebSocket URL, JSON request payloads, per-call timeouts
[OUTPUT]: Correlated JSON replies or typed request failures
[POS]:    WebSocket layer - public request/response client
[UPDATE]: When changing the client state machine or request id assignment
*/

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConnectError, RequestError};
use crate::ws::correlator::{Correlator, InboundSink, Waiter};
use crate::ws::factory::RequestIdGenerator;
use crate::ws::transport::{ConnectionState, Transport};

/// Client-level lifecycle: `Idle -> Connecting -> Open -> Closing -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// One WebSocket connection with request/reply correlation.
///
/// Every method takes `&self`, so several `request()` futures can run
/// against the same connection concurrently.
#[derive(Debug)]
pub struct RequestClient {
    url: Url,
    state: Mutex<ClientState>,
    transport: OnceLock<Transport>,
    correlator: Arc<Correlator>,
    ids: Arc<RequestIdGenerator>,
}

impl RequestClient {
    pub fn new(url: Url, ids: Arc<RequestIdGenerator>) -> Self {
        Self::with_correlator(url, ids, Correlator::new())
    }

    /// Build a client around a preconfigured correlator (e.g. with an unmatched-reply hook).
    pub fn with_correlator(url: Url, ids: Arc<RequestIdGenerator>, correlator: Correlator) -> Self {
        Self {
            url,
            state: Mutex::new(ClientState::Idle),
            transport: OnceLock::new(),
            correlator: Arc::new(correlator),
            ids,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ClientState {
        let state = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // A peer-side close moves the socket to Closed without going through us.
        match (state, self.transport.get().map(Transport::state)) {
            (ClientState::Open, Some(ConnectionState::Closing | ConnectionState::Closed)) => {
                ClientState::Closed
            }
            _ => state,
        }
    }

    fn set_state(&self, next: ClientState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Open the socket. Only valid once, from `Idle`.
    pub async fn connect(&self, timeout: Duration) -> Result<(), ConnectError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != ClientState::Idle {
                return Err(ConnectError::Protocol(format!(
                    "connect called in state {:?}",
                    *state
                )));
            }
            *state = ClientState::Connecting;
        }

        let sink: Arc<dyn InboundSink> = self.correlator.clone();
        match Transport::connect(&self.url, timeout, sink).await {
            Ok(transport) => {
                let _ = self.transport.set(transport);
                let opened = {
                    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                    if *state == ClientState::Connecting {
                        *state = ClientState::Open;
                        true
                    } else {
                        false
                    }
                };
                if opened {
                    return Ok(());
                }

                // close() ran while the handshake was in flight
                if let Some(transport) = self.transport.get() {
                    transport.close().await;
                }
                Err(ConnectError::Protocol("client closed during connect".to_string()))
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "ws connect failed");
                self.set_state(ClientState::Closed);
                self.correlator.on_connection_closed();
                Err(err)
            }
        }
    }

    /// Send `payload` and wait for the reply carrying the same `req_id`.
    ///
    /// A `req_id` already present in the payload is used as-is; otherwise one
    /// is assigned from the id generator.
    pub async fn request<P: Serialize>(
        &self,
        payload: &P,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        match self.state() {
            ClientState::Open => {}
            ClientState::Idle | ClientState::Connecting => return Err(RequestError::NotConnected),
            ClientState::Closing | ClientState::Closed => {
                return Err(RequestError::ConnectionClosed);
            }
        }
        let Some(transport) = self.transport.get() else {
            return Err(RequestError::NotConnected);
        };

        let mut payload = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(RequestError::InvalidPayload(format!(
                    "expected a JSON object, got {other}"
                )));
            }
            Err(err) => return Err(RequestError::InvalidPayload(err.to_string())),
        };

        let mut waiter = match payload.get("req_id") {
            Some(value) => {
                let request_id = value.as_u64().ok_or_else(|| {
                    RequestError::InvalidPayload(format!(
                        "req_id must be an unsigned integer, got {value}"
                    ))
                })?;
                self.correlator.register(request_id)?
            }
            None => {
                let waiter = self.register_generated()?;
                payload.insert("req_id".to_string(), Value::from(waiter.request_id()));
                waiter
            }
        };
        let request_id = waiter.request_id();
        let text = Value::Object(payload).to_string();
        debug!(req_id = request_id, bytes = text.len(), "ws request sent");
        transport.send(text).await?;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        tokio::select! {
            biased;
            result = &mut waiter => result,
            _ = &mut deadline => {
                // Loses quietly if the reply resolved the slot first.
                self.correlator.on_timeout(request_id, timeout);
                waiter.await
            }
        }
    }

    /// Register the next generated id, skipping ids a caller already holds.
    fn register_generated(&self) -> Result<Waiter, RequestError> {
        loop {
            let request_id = self.ids.next_id();
            match self.correlator.register(request_id) {
                Err(RequestError::DuplicateRequestId(_)) => {
                    debug!(req_id = request_id, "generated id in use; skipping");
                }
                registered => return registered,
            }
        }
    }

    /// Close the connection and fail every pending request.
    ///
    /// Safe to call repeatedly and without a prior successful `connect`.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == ClientState::Closed {
                return;
            }
            *state = ClientState::Closing;
        }

        if let Some(transport) = self.transport.get() {
            transport.close().await;
        }
        self.correlator.on_connection_closed();
        self.set_state(ClientState::Closed);
        debug!(url = %self.url, "ws client closed");
    }
}
