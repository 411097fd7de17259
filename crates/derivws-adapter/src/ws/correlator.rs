/*
[INPUT]:  Registered request ids, inbound messages, timeouts, connection-closed events
[OUTPUT]: Single-fire resolution of each pending request
[POS]:    WebSocket layer - request/reply correlation
[UPDATE]: When changing resolution rules or the pending table
*/

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::RequestError;
use crate::ws::message::InboundMessage;

/// Callback invoked for inbound messages that no pending request claimed.
pub type UnmatchedHook = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

type Slot = oneshot::Sender<Result<Value, RequestError>>;

/// Receiver side of inbound traffic. The transport reports every decoded
/// frame and the final close through this trait.
pub trait InboundSink: Send + Sync {
    fn on_message(&self, message: InboundMessage);
    fn on_connection_closed(&self);
}

#[derive(Debug)]
struct PendingRequest {
    generation: u64,
    registered_at: Instant,
    slot: Slot,
}

/// Table of in-flight requests keyed by `req_id`.
pub struct Correlator {
    pending: Mutex<HashMap<u64, PendingRequest>>,
    closed: AtomicBool,
    next_generation: AtomicU64,
    unmatched_hook: Option<UnmatchedHook>,
}

impl fmt::Debug for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.pending_count())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .field("unmatched_hook", &self.unmatched_hook.is_some())
            .finish()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            next_generation: AtomicU64::new(0),
            unmatched_hook: None,
        }
    }

    /// Observe replies that arrive without a matching waiter.
    pub fn with_unmatched_hook(mut self, hook: UnmatchedHook) -> Self {
        self.unmatched_hook = Some(hook);
        self
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pending_count(&self) -> usize {
        self.table().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Create a pending entry for `request_id` and return its waiter.
    pub fn register(self: &Arc<Self>, request_id: u64) -> Result<Waiter, RequestError> {
        let (slot, rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut table = self.table();
            // Checked under the lock so a concurrent close cannot miss this entry.
            if self.is_closed() {
                return Err(RequestError::ConnectionClosed);
            }
            if table.contains_key(&request_id) {
                return Err(RequestError::DuplicateRequestId(request_id));
            }
            table.insert(
                request_id,
                PendingRequest {
                    generation,
                    registered_at: Instant::now(),
                    slot,
                },
            );
        }

        Ok(Waiter {
            request_id,
            generation,
            rx,
            correlator: Arc::clone(self),
        })
    }

    /// Resolve the entry for `request_id` with a failure, if it is still pending.
    /// Returns `false` when the entry was already resolved.
    pub fn on_timeout(&self, request_id: u64, after: Duration) -> bool {
        let Some(pending) = self.table().remove(&request_id) else {
            return false;
        };
        debug!(
            req_id = request_id,
            waited_ms = pending.registered_at.elapsed().as_millis() as u64,
            "request timed out"
        );
        let _ = pending.slot.send(Err(RequestError::Timeout { after }));
        true
    }

    fn cancel(&self, request_id: u64, generation: u64) {
        let mut table = self.table();
        if table
            .get(&request_id)
            .is_some_and(|pending| pending.generation == generation)
        {
            table.remove(&request_id);
            debug!(req_id = request_id, "pending request cancelled");
        }
    }
}

impl InboundSink for Correlator {
    fn on_message(&self, message: InboundMessage) {
        let pending = message
            .request_id
            .and_then(|request_id| self.table().remove(&request_id));

        match pending {
            Some(pending) => {
                // A waiter that was dropped between removal and send is fine.
                let _ = pending.slot.send(Ok(message.body));
            }
            None => {
                debug!(req_id = ?message.request_id, "dropping unmatched reply");
                if let Some(hook) = &self.unmatched_hook {
                    hook(&message);
                }
            }
        }
    }

    fn on_connection_closed(&self) {
        let drained: Vec<(u64, PendingRequest)> = {
            let mut table = self.table();
            self.closed.store(true, Ordering::Release);
            table.drain().collect()
        };

        if !drained.is_empty() {
            debug!(count = drained.len(), "failing pending requests on close");
        }
        for (_, pending) in drained {
            let _ = pending.slot.send(Err(RequestError::ConnectionClosed));
        }
    }
}

/// Handle to one pending request; resolves exactly once.
///
/// Dropping it before resolution removes the pending entry.
#[derive(Debug)]
pub struct Waiter {
    request_id: u64,
    generation: u64,
    rx: oneshot::Receiver<Result<Value, RequestError>>,
    correlator: Arc<Correlator>,
}

impl Waiter {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }
}

impl Future for Waiter {
    type Output = Result<Value, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RequestError::ConnectionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.correlator.cancel(self.request_id, self.generation);
    }
}
