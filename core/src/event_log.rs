//! Bounded replay of the durable ticket event log.
//!
//! The read model rebuilds itself at start-up by fetching the retained event
//! history and applying it in order. [`EventLog`] is that one capability: give me
//! up to `max_messages` payloads, oldest first.
//!
//! # Ordering
//!
//! Implementations MUST return payloads in commit (append) order. Consumers do
//! not sort by timestamp; replay correctness depends on this order alone.
//!
//! # Implementations
//!
//! - `InMemoryEventLog` (in `kitchen-board-testing`): Vec-backed, with failure injection
//! - `RedpandaEventLog` (in `kitchen-board-redpanda`): reads a topic from the earliest offset

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while fetching from the event log.
#[derive(Error, Debug, Clone)]
pub enum EventLogError {
    /// Could not reach the log.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The log was reachable but the read failed.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// The log does not exist (e.g. topic not created yet).
    #[error("Event log not found: {0}")]
    NotFound(String),
}

/// Source of historical events for replay.
///
/// # Dyn Compatibility
///
/// Explicit `Pin<Box<dyn Future>>` returns keep the trait usable as
/// `Arc<dyn EventLog>`.
pub trait EventLog: Send + Sync {
    /// Fetch up to `max_messages` raw payloads in commit order.
    ///
    /// An empty log returns an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError`] if the log cannot be read.
    fn fetch(
        &self,
        max_messages: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<u8>>, EventLogError>> + Send + '_>>;
}
