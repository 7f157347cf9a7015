//! # Kitchen Board Testing
//!
//! Test doubles and helpers for the kitchen ticket read model.
//!
//! This crate provides:
//! - [`InMemoryEventBus`]: channel-backed live bus with error injection
//! - [`InMemoryEventLog`]: Vec-backed replay log with failure and latency injection
//! - [`StaticTicketSource`]: canned fallback listing
//! - [`fixtures`]: tickets and events on a deterministic timeline
//! - [`properties`]: proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use kitchen_board_testing::{fixtures, InMemoryEventLog};
//! use kitchen_board_core::ticket::TicketStatus;
//!
//! #[tokio::test]
//! async fn replay_drops_delivered_tickets() {
//!     let log = InMemoryEventLog::with_events(&[
//!         fixtures::created("a", "grill", TicketStatus::Created),
//!         fixtures::created("b", "grill", TicketStatus::Delivered),
//!     ]);
//!     let cache = TicketStateCache::new().with_event_log(Arc::new(log));
//!
//!     cache.warm().await.unwrap();
//!     assert_eq!(cache.len(), 1);
//! }
//! ```

pub mod event_bus;
pub mod event_log;
pub mod fixtures;
pub mod properties;
pub mod ticket_source;

// Re-export commonly used items
pub use event_bus::InMemoryEventBus;
pub use event_log::InMemoryEventLog;
pub use ticket_source::StaticTicketSource;
