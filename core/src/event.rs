//! Kitchen ticket events and their JSON wire format.
//!
//! Every event is a JSON object carrying an `event_type` discriminator and an
//! `occurred_at` timestamp. Two shapes are understood:
//!
//! - `kitchen.ticket.created`: the full [`TicketSnapshot`] flattened into the event
//! - `kitchen.ticket.status_changed`: a [`TicketStatusChanged`] body
//!
//! # Decoding
//!
//! Decoding is two-pass. The [`EventEnvelope`] is read first to learn the
//! discriminator; the typed body is decoded only for recognised variants.
//! Anything else comes back as [`DecodedEvent::Unknown`] so the event source
//! can add new kinds without breaking consumers.
//!
//! ```
//! use kitchen_board_core::event::{DecodedEvent, KitchenEvent};
//!
//! let raw = br#"{"event_type":"kitchen.table.opened","occurred_at":"2025-01-01T12:00:00Z"}"#;
//! let decoded = KitchenEvent::decode(raw).unwrap();
//! assert!(matches!(decoded, DecodedEvent::Unknown(kind) if kind == "kitchen.table.opened"));
//! ```

use crate::ticket::{TicketSnapshot, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminator of the "ticket created" event.
pub const TICKET_CREATED: &str = "kitchen.ticket.created";

/// Discriminator of the "ticket status changed" event.
pub const TICKET_STATUS_CHANGED: &str = "kitchen.ticket.status_changed";

/// Error types for event encoding and decoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize an event to JSON.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// The payload is not a JSON object with an `event_type` string.
    #[error("Malformed event envelope: {0}")]
    MalformedEnvelope(String),

    /// The discriminator is known but the body does not match its shape.
    #[error("Malformed {event_type} event: {reason}")]
    MalformedBody {
        /// The recognised discriminator.
        event_type: String,
        /// What failed to decode.
        reason: String,
    },
}

/// First-pass view of an event: just enough to route it.
#[derive(Clone, Debug, Deserialize)]
pub struct EventEnvelope {
    /// Event discriminator.
    pub event_type: String,
    /// When the event happened, if present.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// A ticket entered the kitchen, with its full initial snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCreated {
    /// When the ticket was created upstream.
    pub occurred_at: DateTime<Utc>,
    /// Complete ticket snapshot.
    #[serde(flatten)]
    pub ticket: TicketSnapshot,
}

/// A ticket moved to a new lifecycle state.
///
/// Besides the new status, the event may carry enough of the ticket to build a
/// minimal record when the matching created event was never seen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatusChanged {
    /// When the transition happened.
    pub occurred_at: DateTime<Utc>,
    /// Ticket being transitioned.
    pub ticket_id: String,
    /// State after the transition.
    pub new_status: TicketStatus,
    /// State before the transition, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<TicketStatus>,
    /// Cancellation / rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code_id: Option<String>,
    /// Replacement notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Preparation start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Ready time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Delivery time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    /// Owning order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Order line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_item_id: Option<String>,
    /// Menu item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_item_id: Option<String>,
    /// Production station code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    /// Portions to prepare.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Menu item display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_item_name: Option<String>,
    /// Station display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    /// Table label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
}

impl TicketStatusChanged {
    /// A status change carrying only the required fields.
    #[must_use]
    pub fn new(
        ticket_id: impl Into<String>,
        new_status: TicketStatus,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            occurred_at,
            ticket_id: ticket_id.into(),
            new_status,
            previous_status: None,
            reason_code_id: None,
            notes: None,
            started_at: None,
            finished_at: None,
            delivered_at: None,
            order_id: None,
            order_item_id: None,
            menu_item_id: None,
            station: None,
            quantity: None,
            menu_item_name: None,
            station_name: None,
            table_number: None,
        }
    }
}

/// The kitchen ticket events this crate understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KitchenEvent {
    /// `kitchen.ticket.created`
    TicketCreated(TicketCreated),
    /// `kitchen.ticket.status_changed`
    TicketStatusChanged(TicketStatusChanged),
}

/// Outcome of decoding a raw payload that was valid JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedEvent {
    /// A recognised event.
    Known(KitchenEvent),
    /// A discriminator this crate does not handle.
    Unknown(String),
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    event_type: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

impl KitchenEvent {
    /// Wire discriminator of this event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::TicketCreated(_) => TICKET_CREATED,
            Self::TicketStatusChanged(_) => TICKET_STATUS_CHANGED,
        }
    }

    /// Ticket the event refers to.
    #[must_use]
    pub fn ticket_id(&self) -> &str {
        match self {
            Self::TicketCreated(e) => &e.ticket.ticket_id,
            Self::TicketStatusChanged(e) => &e.ticket_id,
        }
    }

    /// When the event happened.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::TicketCreated(e) => e.occurred_at,
            Self::TicketStatusChanged(e) => e.occurred_at,
        }
    }

    /// Decode a raw JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MalformedEnvelope`] if the payload is not an object
    /// with a string `event_type`, and [`EventError::MalformedBody`] if a known
    /// discriminator carries a body of the wrong shape. Unknown discriminators
    /// are not errors.
    pub fn decode(bytes: &[u8]) -> Result<DecodedEvent, EventError> {
        let envelope: EventEnvelope = serde_json::from_slice(bytes)
            .map_err(|e| EventError::MalformedEnvelope(e.to_string()))?;

        let malformed = |e: serde_json::Error| EventError::MalformedBody {
            event_type: envelope.event_type.clone(),
            reason: e.to_string(),
        };

        let event = match envelope.event_type.as_str() {
            TICKET_CREATED => {
                Self::TicketCreated(serde_json::from_slice(bytes).map_err(malformed)?)
            }
            TICKET_STATUS_CHANGED => {
                Self::TicketStatusChanged(serde_json::from_slice(bytes).map_err(malformed)?)
            }
            _ => return Ok(DecodedEvent::Unknown(envelope.event_type)),
        };

        Ok(DecodedEvent::Known(event))
    }

    /// Encode to the JSON wire format, discriminator included.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if JSON serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, EventError> {
        let event_type = self.event_type();
        let result = match self {
            Self::TicketCreated(body) => serde_json::to_vec(&Tagged { event_type, body }),
            Self::TicketStatusChanged(body) => serde_json::to_vec(&Tagged { event_type, body }),
        };
        result.map_err(|e| EventError::SerializationError(e.to_string()))
    }
}

impl From<TicketCreated> for KitchenEvent {
    fn from(event: TicketCreated) -> Self {
        Self::TicketCreated(event)
    }
}

impl From<TicketStatusChanged> for KitchenEvent {
    fn from(event: TicketStatusChanged) -> Self {
        Self::TicketStatusChanged(event)
    }
}
