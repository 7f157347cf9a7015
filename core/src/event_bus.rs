//! Event bus abstraction for live ticket updates.
//!
//! This module provides the [`EventBus`] trait for publishing raw event payloads to a
//! topic and subscribing to a stream of them, plus the [`EventHandler`] callback used
//! by subscribers that process one message at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Kitchen service  │  owns ticket lifecycle
//! └────────┬─────────┘
//!          │ publish(kitchen-ticket-events)
//!          ▼
//! ┌──────────────────┐
//! │    Event Bus     │◄─── At-least-once delivery
//! └────────┬─────────┘
//!          │ subscribe
//!          ▼
//! ┌──────────────────┐
//! │  LiveSubscriber  │──► TicketStateCache
//! └──────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **At-least-once delivery**: Messages may be delivered more than once
//! - **Idempotency**: Handlers must tolerate duplicates
//! - **Opaque payloads**: The bus moves bytes; decoding belongs to the consumer
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (in `kitchen-board-testing`) - For tests
//! - `RedpandaEventBus` (in `kitchen-board-redpanda`) - For production (Kafka-compatible)
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//!
//! let mut stream = event_bus.subscribe(&["kitchen-ticket-events"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(payload) => handler.handle(&payload).await?,
//!         Err(e) => tracing::error!(error = %e, "Event stream error"),
//!     }
//! }
//! ```

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A received message could not be turned into a payload
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of raw event payloads from a subscription.
///
/// Each item is either the payload bytes of one message or a transport-level
/// error. Consumers log item errors and keep reading.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so a single bus can be shared
/// behind `Arc<dyn EventBus>`.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// to enable trait object usage (`Arc<dyn EventBus>`).
pub trait EventBus: Send + Sync {
    /// Publish a raw payload to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of payloads.
    ///
    /// Messages published after this future resolves are buffered by the
    /// implementation until the stream is polled.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}

/// Error returned by an [`EventHandler`].
///
/// Subscribers log it and move on to the next message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EventHandlerError(pub String);

/// Per-message callback for subscribers.
///
/// Handlers receive raw bytes so the transport stays independent of the event
/// types. Errors are logged by the caller and never stop the subscription.
pub trait EventHandler: Send + Sync {
    /// Handle one raw message.
    ///
    /// # Errors
    ///
    /// Returns [`EventHandlerError`] if the message could not be processed.
    fn handle<'a>(
        &'a self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventHandlerError>> + Send + 'a>>;
}
