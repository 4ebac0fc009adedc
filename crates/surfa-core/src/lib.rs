//! Surfa Core Types
//!
//! This crate provides the data side of the Surfa ingest SDK:
//! - Canonical event records and the helper constructors that build them
//! - Runtime metadata attached to a session
//! - Ingest key and event validation
//! - Core error types

pub mod error;
pub mod event;
pub mod factory;
pub mod runtime;
pub mod util;

pub use error::{Error, Result};
pub use event::{Event, EventBuilder, Extra, validate_event};
pub use runtime::RuntimeInfo;
