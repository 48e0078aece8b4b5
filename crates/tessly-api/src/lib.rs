// tessly-api: Async Rust client for the Tessie vehicle API (REST + streaming telemetry)

pub mod client;
pub mod error;
pub mod streaming;
pub mod transport;

pub use client::TessieClient;
pub use error::Error;
pub use streaming::{Frame, ReconnectConfig, StreamHandle};
pub use transport::TransportConfig;
