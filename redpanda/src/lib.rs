//! Redpanda transport for the kitchen ticket read model.
//!
//! This crate provides the two Kafka-compatible collaborators the cache needs:
//!
//! - [`RedpandaEventBus`]: the [`EventBus`] used for live ticket updates
//! - [`RedpandaEventLog`]: the [`EventLog`] used to replay the topic's retained
//!   history at start-up
//!
//! Both move raw JSON payloads; decoding belongs to the consumer.
//!
//! # Ordering
//!
//! Kafka orders messages per partition only. Publishers key ticket events by
//! `ticket_id`, so every event of one ticket lands on one partition and keeps
//! its commit order through both replay and live delivery. Interleaving across
//! tickets does not matter to the cache.
//!
//! # Example
//!
//! ```no_run
//! use kitchen_board_redpanda::{RedpandaEventBus, RedpandaEventLog};
//! use kitchen_board_core::event_log::EventLog;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("kitchen-board-cache")
//!     .build()?;
//!
//! let log = RedpandaEventLog::builder()
//!     .brokers("localhost:9092")
//!     .topic("kitchen-ticket-events")
//!     .build()?;
//! let history = log.fetch(10_000).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`EventBus`]: kitchen_board_core::event_bus::EventBus
//! [`EventLog`]: kitchen_board_core::event_log::EventLog

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod event_bus;
mod event_log;

pub use event_bus::{RedpandaEventBus, RedpandaEventBusBuilder, partition_key};
pub use event_log::{RedpandaEventLog, RedpandaEventLogBuilder};
