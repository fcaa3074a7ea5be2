//! Ceph REST Client Library
//!
//! Async client for the Ceph dashboard REST API. Mutating RBD calls are
//! accepted by the server and finished by background tasks; the
//! [`engine`] submits them, follows the task queue and resubmits when a
//! task fails for a transient reason.

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod operations;
pub mod session;
pub mod transport;

pub use client::{CephClient, CephClientBuilder};
pub use config::{ClientConfig, EngineConfig, RetryConfig, ServerConfig};
pub use error::{CephError, ConflictKind, Result};
pub use logging::Logger;
