//! # Data Ingestors Module
//!
//! Clients that pull records from an external feed and hand them to a
//! `MessageSink`.
//!
//! ## Contained Modules:
//! - **`ris_live`**: the RIPE RIS Live WebSocket client. It owns the
//!   connection state machine, replays the subscription on every connection
//!   and reconnects after drops.
//! - **`backoff`**: capped exponential delay between reconnect attempts.

#![forbid(unsafe_code)]

/// Capped exponential reconnect delay.
pub mod backoff;
/// The reconnecting RIS Live WebSocket client.
pub mod ris_live;

// --- Public API Re-exports ---
pub use backoff::Backoff;
pub use ris_live::{
    ConnectionManager, ConnectionState, DEFAULT_CLIENT_NAME, RIS_LIVE_URL, StreamConfig,
    TransportError, endpoint, is_valid_client_name,
};
