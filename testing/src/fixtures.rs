//! Ticket and event builders with deterministic timestamps.

use chrono::{DateTime, Duration, TimeZone, Utc};
use kitchen_board_core::event::{KitchenEvent, TicketCreated, TicketStatusChanged};
use kitchen_board_core::ticket::{TicketRecord, TicketSnapshot, TicketStatus};

/// 2025-01-01 12:00:00 UTC, the start of every fixture timeline.
///
/// # Panics
///
/// Never in practice; the timestamp is a valid constant.
#[must_use]
#[allow(clippy::expect_used)]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
        .single()
        .expect("hardcoded timestamp should always be valid")
}

/// `minutes` after [`base_time`].
#[must_use]
pub fn at(minutes: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minutes)
}

/// A full snapshot with plausible display fields.
#[must_use]
pub fn snapshot(ticket_id: &str, station: &str, status: TicketStatus) -> TicketSnapshot {
    TicketSnapshot {
        ticket_id: ticket_id.to_string(),
        order_id: format!("order-{ticket_id}"),
        order_item_id: format!("item-{ticket_id}"),
        menu_item_id: "menu-burger".to_string(),
        station: station.to_string(),
        status,
        quantity: 1,
        notes: String::new(),
        reason_code_id: None,
        menu_item_name: "Burger".to_string(),
        station_name: station.to_uppercase(),
        table_number: Some("7".to_string()),
        created_at: Some(base_time()),
        updated_at: Some(base_time()),
        started_at: None,
        finished_at: None,
        delivered_at: None,
    }
}

/// A record built from [`snapshot`].
#[must_use]
pub fn ticket(ticket_id: &str, station: &str, status: TicketStatus) -> TicketRecord {
    snapshot(ticket_id, station, status).into_record(base_time())
}

/// A "ticket created" event at [`base_time`].
#[must_use]
pub fn created(ticket_id: &str, station: &str, status: TicketStatus) -> KitchenEvent {
    KitchenEvent::TicketCreated(TicketCreated {
        occurred_at: base_time(),
        ticket: snapshot(ticket_id, station, status),
    })
}

/// A bare "ticket status changed" event `minutes` after [`base_time`].
#[must_use]
pub fn status_changed(ticket_id: &str, status: TicketStatus, minutes: i64) -> KitchenEvent {
    KitchenEvent::TicketStatusChanged(TicketStatusChanged::new(ticket_id, status, at(minutes)))
}

/// Encode an event to its wire payload.
///
/// # Panics
///
/// Panics if the event cannot be encoded.
#[must_use]
#[allow(clippy::expect_used)]
pub fn payload(event: &KitchenEvent) -> Vec<u8> {
    event.encode().expect("kitchen events always encode")
}
