//! # Core Module
//!
//! Process-wide pieces shared by the ingestor and the binary:
//!
//! - **`shutdown`**: the single cancellation entry point. One
//!   `ShutdownCoordinator` lives for the whole process; asking it to shut down
//!   more than once is harmless.
//! - **`sink`**: where received records go. A channel-backed sink hands
//!   records to another task, which `write_lines` drains to stdout.

#![forbid(unsafe_code)]

/// Cooperative, idempotent shutdown of every tracked task.
pub mod shutdown;
/// Consumers of received frames.
pub mod sink;

// --- Public API Re-exports ---
pub use shutdown::ShutdownCoordinator;
pub use sink::{ChannelSink, MessageSink, SinkError, write_lines};
