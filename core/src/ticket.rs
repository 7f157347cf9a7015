//! Kitchen ticket domain types.
//!
//! A [`TicketRecord`] is one unit of kitchen production work derived from an
//! order item. Records are published into the read model behind `Arc`, so once a
//! reader holds one it never changes underneath them; updates replace the
//! record wholesale.
//!
//! [`TicketSnapshot`] is the wire shape of a full ticket. It is the body of the
//! "ticket created" event and the element type of the kitchen service's
//! active-ticket listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a kitchen ticket.
///
/// ```text
/// created ──► started ──► ready ──► delivered
///    │           │          │
///    └───────────┴──────────┴──────► cancelled
/// ```
///
/// `Delivered` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Ticket accepted by the kitchen, not yet picked up.
    Created,
    /// A cook is working on it.
    Started,
    /// Plated and waiting at the pass.
    Ready,
    /// Handed over to the table. Terminal.
    Delivered,
    /// Cancelled or rejected from any non-terminal state. Terminal.
    Cancelled,
}

impl TicketStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Created,
        Self::Started,
        Self::Ready,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether the ticket is finished as far as production tracking goes.
    ///
    /// # Example
    ///
    /// ```
    /// use kitchen_board_core::ticket::TicketStatus;
    ///
    /// assert!(TicketStatus::Delivered.is_terminal());
    /// assert!(!TicketStatus::Ready.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Wire representation (`"created"`, `"started"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a status string outside the known lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown ticket status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// One kitchen ticket as held by the read model.
///
/// `ticket_id` is the unique key. Order, item and menu references are opaque and
/// never validated. The display fields (`menu_item_name`, `station_name`,
/// `table_number`) are denormalised copies so the board needs no joins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Unique ticket identifier.
    pub ticket_id: String,
    /// Owning order.
    pub order_id: String,
    /// Order line this ticket produces.
    pub order_item_id: String,
    /// Menu item being prepared.
    pub menu_item_id: String,
    /// Production station code (e.g. `"grill"`, `"bar"`).
    pub station: String,
    /// Current lifecycle state.
    pub status: TicketStatus,
    /// Portions to prepare.
    pub quantity: u32,
    /// Free-text notes from the floor or the kitchen.
    pub notes: String,
    /// Reason code, present on cancellation or rejection.
    pub reason_code_id: Option<String>,
    /// Menu item display name.
    pub menu_item_name: String,
    /// Station display name.
    pub station_name: String,
    /// Table label, when the order is for a table.
    pub table_number: Option<String>,
    /// When the ticket was created.
    pub created_at: DateTime<Utc>,
    /// Last change applied to this record.
    pub updated_at: DateTime<Utc>,
    /// When preparation started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the ticket became ready.
    pub finished_at: Option<DateTime<Utc>>,
    /// When the ticket reached the table.
    pub delivered_at: Option<DateTime<Utc>>,
}

impl TicketRecord {
    /// Create a record with only the key, routing and status known.
    ///
    /// Display fields start empty and timestamps start at `at`. Used when a
    /// status change arrives for a ticket the cache has never seen.
    #[must_use]
    pub fn minimal(
        ticket_id: impl Into<String>,
        station: impl Into<String>,
        status: TicketStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            order_id: String::new(),
            order_item_id: String::new(),
            menu_item_id: String::new(),
            station: station.into(),
            status,
            quantity: 0,
            notes: String::new(),
            reason_code_id: None,
            menu_item_name: String::new(),
            station_name: String::new(),
            table_number: None,
            created_at: at,
            updated_at: at,
            started_at: None,
            finished_at: None,
            delivered_at: None,
        }
    }

    /// Whether the ticket is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Full ticket snapshot as carried on the wire.
///
/// `created_at` / `updated_at` may be omitted inside a "ticket created" event,
/// in which case the event's `occurred_at` is used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    /// Unique ticket identifier.
    #[serde(alias = "id")]
    pub ticket_id: String,
    /// Owning order.
    #[serde(default)]
    pub order_id: String,
    /// Order line.
    #[serde(default)]
    pub order_item_id: String,
    /// Menu item.
    #[serde(default)]
    pub menu_item_id: String,
    /// Production station code.
    pub station: String,
    /// Lifecycle state.
    pub status: TicketStatus,
    /// Portions to prepare.
    #[serde(default)]
    pub quantity: u32,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
    /// Cancellation / rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code_id: Option<String>,
    /// Menu item display name.
    #[serde(default)]
    pub menu_item_name: String,
    /// Station display name.
    #[serde(default)]
    pub station_name: String,
    /// Table label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Preparation start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Ready time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Delivery time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl TicketSnapshot {
    /// Convert into a record, filling missing creation/update times from `fallback`.
    ///
    /// `updated_at` falls back to `created_at` first, then to `fallback`.
    #[must_use]
    pub fn into_record(self, fallback: DateTime<Utc>) -> TicketRecord {
        let created_at = self.created_at.unwrap_or(fallback);
        TicketRecord {
            ticket_id: self.ticket_id,
            order_id: self.order_id,
            order_item_id: self.order_item_id,
            menu_item_id: self.menu_item_id,
            station: self.station,
            status: self.status,
            quantity: self.quantity,
            notes: self.notes,
            reason_code_id: self.reason_code_id,
            menu_item_name: self.menu_item_name,
            station_name: self.station_name,
            table_number: self.table_number,
            created_at,
            updated_at: self.updated_at.unwrap_or(if self.created_at.is_some() {
                created_at
            } else {
                fallback
            }),
            started_at: self.started_at,
            finished_at: self.finished_at,
            delivered_at: self.delivered_at,
        }
    }
}

impl From<&TicketRecord> for TicketSnapshot {
    fn from(record: &TicketRecord) -> Self {
        Self {
            ticket_id: record.ticket_id.clone(),
            order_id: record.order_id.clone(),
            order_item_id: record.order_item_id.clone(),
            menu_item_id: record.menu_item_id.clone(),
            station: record.station.clone(),
            status: record.status,
            quantity: record.quantity,
            notes: record.notes.clone(),
            reason_code_id: record.reason_code_id.clone(),
            menu_item_name: record.menu_item_name.clone(),
            station_name: record.station_name.clone(),
            table_number: record.table_number.clone(),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
            started_at: record.started_at,
            finished_at: record.finished_at,
            delivered_at: record.delivered_at,
        }
    }
}
