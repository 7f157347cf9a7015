//! Proptest strategies for kitchen domain types.
//!
//! Ids and stations are drawn from small pools so generated sequences hit the
//! same tickets repeatedly and exercise re-indexing.

use crate::fixtures::{at, snapshot};
use kitchen_board_core::event::{KitchenEvent, TicketCreated, TicketStatusChanged};
use kitchen_board_core::ticket::{TicketRecord, TicketStatus};
use proptest::prelude::*;

/// Any lifecycle status.
pub fn status() -> impl Strategy<Value = TicketStatus> {
    proptest::sample::select(TicketStatus::ALL.to_vec())
}

/// One of a handful of station codes.
pub fn station() -> impl Strategy<Value = String> {
    proptest::sample::select(vec!["grill", "bar", "prep", "pastry"]).prop_map(str::to_string)
}

/// One of `t-0` .. `t-7`.
pub fn ticket_id() -> impl Strategy<Value = String> {
    (0..8u8).prop_map(|n| format!("t-{n}"))
}

/// A ticket record with arbitrary id, station, status and creation minute.
pub fn ticket_record() -> impl Strategy<Value = TicketRecord> {
    (ticket_id(), station(), status(), 0..60i64).prop_map(|(id, station, status, minute)| {
        let mut record = snapshot(&id, &station, status).into_record(at(minute));
        record.created_at = at(minute);
        record.updated_at = at(minute);
        record
    })
}

/// A created or status-changed event over the shared id pool.
pub fn kitchen_event() -> impl Strategy<Value = KitchenEvent> {
    prop_oneof![
        (ticket_id(), station(), status()).prop_map(|(id, station, status)| {
            KitchenEvent::TicketCreated(TicketCreated {
                occurred_at: at(0),
                ticket: snapshot(&id, &station, status),
            })
        }),
        (ticket_id(), status(), 1..60i64, proptest::option::of(station())).prop_map(
            |(id, status, minute, station)| {
                let mut changed = TicketStatusChanged::new(id, status, at(minute));
                changed.station = station;
                KitchenEvent::TicketStatusChanged(changed)
            }
        ),
    ]
}
