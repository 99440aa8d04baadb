//! # Connections Module
//!
//! Transport setup shared by the ingestors. Currently only the TLS client
//! configuration used for `wss://` endpoints.

#![forbid(unsafe_code)]

/// rustls client configuration, with an explicit opt-out of certificate checks.
pub mod tls;

pub use tls::{TlsVerification, client_config};
