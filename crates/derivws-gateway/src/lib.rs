/*
[INPUT]:  Public API exports for derivws-gateway crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod routes;

// Re-export main types for convenience
pub use config::GatewayConfig;
pub use routes::{AppState, create_router};
