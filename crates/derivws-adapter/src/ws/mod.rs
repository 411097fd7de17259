/*
[INPUT]:  WebSocket endpoint configuration and JSON request payloads
[OUTPUT]: Correlated replies over one connection per client
[POS]:    WebSocket layer - transport, correlation and client surface
[UPDATE]: When adding connection options or changing correlation rules
*/

pub mod client;
pub mod correlator;
pub mod factory;
pub mod message;
pub mod transport;

pub use client::{ClientState, RequestClient};
pub use correlator::{Correlator, InboundSink, UnmatchedHook, Waiter};
pub use factory::{ClientConfig, ClientFactory, DEFAULT_APP_ID, DEFAULT_ENDPOINT, RequestIdGenerator};
pub use message::InboundMessage;
pub use transport::{ConnectionState, Transport};
