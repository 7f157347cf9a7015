//! # Kitchen Board Projections
//!
//! The kitchen ticket read model: an in-memory, dual-indexed ticket cache that
//! is warmed by replaying the event log (with an HTTP listing as fallback) and
//! then kept current from the live event bus.
//!
//! ## Components
//!
//! - [`TicketIndex`]: the primary map plus by-station and by-status indexes
//! - [`EventApplier`]: pure event-to-mutation logic shared by replay and live
//! - [`TicketStateCache`]: lock-guarded index, query API and [`warm`](TicketStateCache::warm)
//! - [`LiveSubscriber`]: the live pump, and [`bootstrap`](LiveSubscriber::bootstrap)
//!   for the subscribe-warm-pump start-up order
//!
//! ## Example
//!
//! ```rust,ignore
//! use kitchen_board_projections::{LiveSubscriber, TicketStateCache};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(
//!     TicketStateCache::new()
//!         .with_event_log(event_log)
//!         .with_ticket_source(ticket_source),
//! );
//! let subscriber = LiveSubscriber::new(Arc::clone(&cache), Some(event_bus));
//!
//! let started = subscriber.bootstrap().await?;
//! tracing::info!(tickets = started.report.tickets, "Kitchen board ready");
//!
//! let grill = cache.get_by_station("grill");
//! ```

pub mod applier;
pub mod bootstrap;
pub mod cache;
pub mod index;
pub mod metrics;
pub mod subscriber;
pub mod warm;

pub use applier::{ApplyMode, ApplyOutcome, EventApplier, PayloadOutcome};
pub use bootstrap::{BootstrapError, Bootstrapped};
pub use cache::TicketStateCache;
pub use index::TicketIndex;
pub use subscriber::{CacheEventHandler, LiveSubscriber, SubscriberError, Subscription, DEFAULT_TOPIC};
pub use warm::{WarmConfig, WarmError, WarmReport, WarmSource};
