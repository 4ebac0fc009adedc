//! Surfa Ingest Client
//!
//! This crate buffers events in memory and delivers them in batches to the
//! Surfa ingest API:
//! - Session state (buffer, execution id, runtime metadata, lifecycle)
//! - Flush protocol with one-time runtime-info injection
//! - Retry/backoff and response classification
//! - HTTP transport behind a mockable trait

pub mod client;
pub mod config;
pub mod retry;
mod session;
#[cfg(test)]
mod testing;
pub mod transport;

pub use client::IngestClient;
pub use config::{ClientConfig, RetryConfig};
pub use surfa_core::{Error, Event, Extra, Result, RuntimeInfo};
pub use transport::{HttpTransport, IngestRequest, Transport, TransportError, TransportResponse};
