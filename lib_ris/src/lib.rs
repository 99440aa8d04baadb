//! # lib_ris
//!
//! Building blocks for a long-lived RIPE RIS Live client: filter validation,
//! the `ris_subscribe` payload, and a reconnecting WebSocket ingestor with
//! cooperative shutdown. Modules are gated by folder-level features, see
//! `Cargo.toml`.

// Declare the modules to re-export
#[cfg(feature = "filters")]
pub mod filters;
#[cfg(feature = "filters")]
pub mod subscription;

#[cfg(feature = "streaming")]
pub mod connections;
#[cfg(feature = "streaming")]
pub mod core;
#[cfg(feature = "streaming")]
pub mod ingestors;

// Re-export the types most callers need
#[cfg(feature = "filters")]
pub use filters::{FilterError, FilterSet, MessageType, Peer, RequiredKey};
#[cfg(feature = "filters")]
pub use subscription::SubscriptionRequest;

#[cfg(feature = "streaming")]
pub use crate::core::{MessageSink, ShutdownCoordinator, SinkError};
#[cfg(feature = "streaming")]
pub use ingestors::{ConnectionManager, ConnectionState, StreamConfig, TransportError};
