//! # Kitchen Board Core
//!
//! Domain types and collaborator contracts for the kitchen ticket read model.
//!
//! The read model is a derived, queryable projection of the kitchen service's
//! ticket events. This crate holds what every other crate in the workspace
//! agrees on:
//!
//! - [`ticket`]: `TicketRecord`, `TicketStatus` and the `TicketSnapshot` wire shape
//! - [`event`]: the two ticket events, two-pass decoding and encoding
//! - [`event_log`]: bounded, ordered replay of historical events
//! - [`event_bus`]: live publish/subscribe and the per-message handler contract
//! - [`ticket_source`]: the active-ticket listing used as a bootstrap fallback
//!
//! ## Data flow
//!
//! ```text
//!  EventLog ──fetch──┐
//!                    ├──► EventApplier ──► TicketStateCache ──► Kanban board
//!  EventBus ──sub────┘                         ▲
//!  TicketSource ──list (fallback)──────────────┘
//! ```

pub use chrono::{DateTime, Utc};

pub mod event;
pub mod event_bus;
pub mod event_log;
pub mod ticket;
pub mod ticket_source;

pub use event::{DecodedEvent, EventError, KitchenEvent, TicketCreated, TicketStatusChanged};
pub use event_bus::{EventBus, EventBusError, EventHandler, EventHandlerError, EventStream};
pub use event_log::{EventLog, EventLogError};
pub use ticket::{TicketRecord, TicketSnapshot, TicketStatus};
pub use ticket_source::{TicketSource, TicketSourceError};
