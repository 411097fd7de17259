/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public derivws adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod error;
pub mod format;
pub mod service;
pub mod types;
pub mod ws;

pub use error::{ConnectError, DerivError, RequestError, Result, SendError};
pub use format::ResponseFormatter;
pub use service::{EndpointTimeouts, MarketDataService};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    ClientConfig,
    ClientFactory,
    ClientState,
    ConnectionState,
    Correlator,
    InboundMessage,
    RequestClient,
    RequestIdGenerator,
};
