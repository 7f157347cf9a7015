//! Translation of ticket events into index mutations.
//!
//! [`EventApplier`] is pure: it takes an already-locked [`TicketIndex`] and an
//! event, and decides what to write. Replay and live delivery share this code;
//! only the [`ApplyMode`] differs.
//!
//! # Rules
//!
//! - **Ticket created**: insert or overwrite with the full snapshot.
//! - **Status changed, ticket known**: clone the record, update status, notes,
//!   reason, `updated_at` and any lifecycle timestamps present, fill display
//!   fields that are still blank, then store it.
//! - **Status changed, ticket unknown**: build a minimal record from whatever
//!   the event carries. Events may arrive before their created event.
//!
//! # Terminal tickets
//!
//! In [`ApplyMode::Replay`] terminal records are stored like any other and the
//! caller runs one cleanup pass at the end of the batch. In [`ApplyMode::Live`] a
//! terminal status removes the ticket immediately and never creates one.

use crate::index::TicketIndex;
use kitchen_board_core::event::{DecodedEvent, EventError, KitchenEvent, TicketStatusChanged};
use kitchen_board_core::ticket::TicketRecord;
use std::sync::Arc;

/// How terminal statuses are handled while applying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    /// Bulk replay: keep terminal tickets until the post-replay cleanup pass.
    Replay,
    /// Incremental delivery: drop tickets as soon as they become terminal.
    Live,
}

impl ApplyMode {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::Live => "live",
        }
    }
}

/// What applying one event did to the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A ticket was added from a full snapshot.
    Inserted,
    /// An existing ticket was replaced or updated.
    Updated,
    /// A status change for an unknown ticket created a minimal record.
    InsertedMinimal,
    /// The ticket reached a terminal status and was removed.
    Evicted,
    /// Nothing changed (terminal event for an unknown ticket, or empty id).
    Unchanged,
}

/// Result of applying a raw payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadOutcome {
    /// A known event was applied.
    Applied(ApplyOutcome),
    /// The discriminator is not handled; nothing was applied.
    Ignored(String),
}

/// Applies kitchen events to a [`TicketIndex`].
#[derive(Clone, Copy, Debug, Default)]
pub struct EventApplier;

impl EventApplier {
    /// Decode a raw payload and apply it.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if the payload is malformed. The index is untouched
    /// in that case.
    pub fn apply_payload(
        index: &mut TicketIndex,
        payload: &[u8],
        mode: ApplyMode,
    ) -> Result<PayloadOutcome, EventError> {
        Ok(match KitchenEvent::decode(payload)? {
            DecodedEvent::Known(event) => PayloadOutcome::Applied(Self::apply(index, &event, mode)),
            DecodedEvent::Unknown(event_type) => PayloadOutcome::Ignored(event_type),
        })
    }

    /// Apply one decoded event.
    pub fn apply(index: &mut TicketIndex, event: &KitchenEvent, mode: ApplyMode) -> ApplyOutcome {
        match event {
            KitchenEvent::TicketCreated(created) => {
                let record = created.ticket.clone().into_record(created.occurred_at);
                Self::store(index, record, mode, ApplyOutcome::Inserted)
            }
            KitchenEvent::TicketStatusChanged(changed) => Self::apply_status_change(index, changed, mode),
        }
    }

    fn apply_status_change(
        index: &mut TicketIndex,
        changed: &TicketStatusChanged,
        mode: ApplyMode,
    ) -> ApplyOutcome {
        let Some(existing) = index.get(&changed.ticket_id) else {
            if mode == ApplyMode::Live && changed.new_status.is_terminal() {
                return ApplyOutcome::Unchanged;
            }
            return Self::store(index, minimal_record(changed), mode, ApplyOutcome::InsertedMinimal);
        };

        let mut record = TicketRecord::clone(existing);
        merge_status_change(&mut record, changed);
        Self::store(index, record, mode, ApplyOutcome::Updated)
    }

    fn store(
        index: &mut TicketIndex,
        record: TicketRecord,
        mode: ApplyMode,
        inserted: ApplyOutcome,
    ) -> ApplyOutcome {
        if record.ticket_id.is_empty() {
            return ApplyOutcome::Unchanged;
        }

        if mode == ApplyMode::Live && record.is_terminal() {
            return if index.remove(&record.ticket_id).is_some() {
                ApplyOutcome::Evicted
            } else {
                ApplyOutcome::Unchanged
            };
        }

        match index.set(Arc::new(record)) {
            Some(_) => ApplyOutcome::Updated,
            None => inserted,
        }
    }
}

fn merge_status_change(record: &mut TicketRecord, changed: &TicketStatusChanged) {
    record.status = changed.new_status;
    record.updated_at = changed.occurred_at;

    if let Some(notes) = &changed.notes {
        record.notes.clone_from(notes);
    }
    if changed.reason_code_id.is_some() {
        record.reason_code_id.clone_from(&changed.reason_code_id);
    }
    if changed.started_at.is_some() {
        record.started_at = changed.started_at;
    }
    if changed.finished_at.is_some() {
        record.finished_at = changed.finished_at;
    }
    if changed.delivered_at.is_some() {
        record.delivered_at = changed.delivered_at;
    }

    // Earlier records may be minimal; take whatever the event knows.
    fill_blank(&mut record.station, changed.station.as_ref());
    fill_blank(&mut record.order_id, changed.order_id.as_ref());
    fill_blank(&mut record.order_item_id, changed.order_item_id.as_ref());
    fill_blank(&mut record.menu_item_id, changed.menu_item_id.as_ref());
    fill_blank(&mut record.menu_item_name, changed.menu_item_name.as_ref());
    fill_blank(&mut record.station_name, changed.station_name.as_ref());
    if record.table_number.is_none() {
        record.table_number.clone_from(&changed.table_number);
    }
    if record.quantity == 0 {
        record.quantity = changed.quantity.unwrap_or(0);
    }
}

fn minimal_record(changed: &TicketStatusChanged) -> TicketRecord {
    let mut record = TicketRecord::minimal(
        changed.ticket_id.clone(),
        changed.station.clone().unwrap_or_default(),
        changed.new_status,
        changed.occurred_at,
    );
    merge_status_change(&mut record, changed);
    record
}

fn fill_blank(field: &mut String, value: Option<&String>) {
    if field.is_empty() {
        if let Some(value) = value {
            field.clone_from(value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use kitchen_board_core::event::TicketCreated;
    use kitchen_board_core::ticket::{TicketSnapshot, TicketStatus};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap()
    }

    fn created(id: &str, station: &str, status: TicketStatus) -> KitchenEvent {
        KitchenEvent::TicketCreated(TicketCreated {
            occurred_at: at(0),
            ticket: TicketSnapshot {
                ticket_id: id.to_string(),
                order_id: "order-1".to_string(),
                order_item_id: "item-1".to_string(),
                menu_item_id: "menu-1".to_string(),
                station: station.to_string(),
                status,
                quantity: 1,
                notes: "no salt".to_string(),
                reason_code_id: None,
                menu_item_name: "Burger".to_string(),
                station_name: "Grill".to_string(),
                table_number: Some("4".to_string()),
                created_at: None,
                updated_at: None,
                started_at: None,
                finished_at: None,
                delivered_at: None,
            },
        })
    }

    fn changed(id: &str, status: TicketStatus, minute: u32) -> TicketStatusChanged {
        TicketStatusChanged::new(id, status, at(minute))
    }

    #[test]
    fn created_event_inserts_full_snapshot() {
        let mut index = TicketIndex::new();
        let outcome = EventApplier::apply(&mut index, &created("t-1", "grill", TicketStatus::Created), ApplyMode::Live);

        assert_eq!(outcome, ApplyOutcome::Inserted);
        let record = index.get("t-1").unwrap();
        assert_eq!(record.menu_item_name, "Burger");
        assert_eq!(record.created_at, at(0));
        assert_eq!(record.updated_at, at(0));
    }

    #[test]
    fn created_event_twice_is_idempotent() {
        let mut index = TicketIndex::new();
        let event = created("t-1", "grill", TicketStatus::Created);
        EventApplier::apply(&mut index, &event, ApplyMode::Live);
        let once = index.all();

        assert_eq!(EventApplier::apply(&mut index, &event, ApplyMode::Live), ApplyOutcome::Updated);
        assert_eq!(index.all(), once);
        index.verify().unwrap();
    }

    #[test]
    fn status_change_updates_in_place_and_keeps_display_fields() {
        let mut index = TicketIndex::new();
        EventApplier::apply(&mut index, &created("t-1", "grill", TicketStatus::Created), ApplyMode::Live);

        let mut change = changed("t-1", TicketStatus::Started, 3);
        change.started_at = Some(at(3));
        change.notes = Some("extra cheese".to_string());
        let outcome = EventApplier::apply(&mut index, &change.into(), ApplyMode::Live);

        assert_eq!(outcome, ApplyOutcome::Updated);
        let record = index.get("t-1").unwrap();
        assert_eq!(record.status, TicketStatus::Started);
        assert_eq!(record.started_at, Some(at(3)));
        assert_eq!(record.updated_at, at(3));
        assert_eq!(record.notes, "extra cheese");
        assert_eq!(record.menu_item_name, "Burger");
        assert_eq!(record.created_at, at(0));
        assert!(index.by_status(TicketStatus::Created).is_empty());
    }

    #[test]
    fn status_change_without_notes_keeps_existing_notes() {
        let mut index = TicketIndex::new();
        EventApplier::apply(&mut index, &created("t-1", "grill", TicketStatus::Created), ApplyMode::Live);
        EventApplier::apply(&mut index, &changed("t-1", TicketStatus::Ready, 5).into(), ApplyMode::Live);

        assert_eq!(index.get("t-1").unwrap().notes, "no salt");
    }

    #[test]
    fn status_change_for_unknown_ticket_creates_minimal_record() {
        let mut index = TicketIndex::new();
        let mut change = changed("new-ticket", TicketStatus::Started, 2);
        change.menu_item_name = Some("Burger".to_string());
        change.station = Some("grill".to_string());

        let outcome = EventApplier::apply(&mut index, &change.into(), ApplyMode::Live);

        assert_eq!(outcome, ApplyOutcome::InsertedMinimal);
        let record = index.get("new-ticket").unwrap();
        assert_eq!(record.status, TicketStatus::Started);
        assert_eq!(record.menu_item_name, "Burger");
        assert_eq!(record.created_at, at(2));
        assert_eq!(index.by_station("grill").len(), 1);
    }

    #[test]
    fn later_status_change_fills_blank_display_fields() {
        let mut index = TicketIndex::new();
        EventApplier::apply(&mut index, &changed("t-1", TicketStatus::Started, 1).into(), ApplyMode::Live);

        let mut change = changed("t-1", TicketStatus::Ready, 2);
        change.station = Some("bar".to_string());
        change.menu_item_name = Some("Mojito".to_string());
        EventApplier::apply(&mut index, &change.into(), ApplyMode::Live);

        let record = index.get("t-1").unwrap();
        assert_eq!(record.station, "bar");
        assert_eq!(record.menu_item_name, "Mojito");
        index.verify().unwrap();
    }

    #[test]
    fn live_terminal_status_evicts() {
        let mut index = TicketIndex::new();
        EventApplier::apply(&mut index, &created("t-1", "grill", TicketStatus::Ready), ApplyMode::Live);

        let outcome = EventApplier::apply(&mut index, &changed("t-1", TicketStatus::Delivered, 9).into(), ApplyMode::Live);

        assert_eq!(outcome, ApplyOutcome::Evicted);
        assert!(index.is_empty());
        index.verify().unwrap();
    }

    #[test]
    fn live_terminal_status_for_unknown_ticket_is_ignored() {
        let mut index = TicketIndex::new();
        let outcome = EventApplier::apply(&mut index, &changed("ghost", TicketStatus::Cancelled, 1).into(), ApplyMode::Live);

        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert!(index.is_empty());
    }

    #[test]
    fn replay_keeps_terminal_tickets_for_cleanup() {
        let mut index = TicketIndex::new();
        EventApplier::apply(&mut index, &created("t-1", "grill", TicketStatus::Delivered), ApplyMode::Replay);

        assert_eq!(index.by_status(TicketStatus::Delivered).len(), 1);
        assert_eq!(index.evict_terminal(), 1);
    }

    #[test]
    fn cancellation_records_reason() {
        let mut index = TicketIndex::new();
        EventApplier::apply(&mut index, &created("t-1", "grill", TicketStatus::Created), ApplyMode::Replay);

        let mut change = changed("t-1", TicketStatus::Cancelled, 4);
        change.reason_code_id = Some("out-of-stock".to_string());
        EventApplier::apply(&mut index, &change.into(), ApplyMode::Replay);

        assert_eq!(index.get("t-1").unwrap().reason_code_id.as_deref(), Some("out-of-stock"));
    }

    #[test]
    fn payload_with_unknown_type_is_ignored() {
        let mut index = TicketIndex::new();
        let outcome = EventApplier::apply_payload(
            &mut index,
            br#"{"event_type":"kitchen.printer.jammed","occurred_at":"2025-01-01T12:00:00Z"}"#,
            ApplyMode::Live,
        )
        .unwrap();

        assert_eq!(outcome, PayloadOutcome::Ignored("kitchen.printer.jammed".to_string()));
        assert!(index.is_empty());
    }

    #[test]
    fn malformed_payload_leaves_index_untouched() {
        let mut index = TicketIndex::new();
        EventApplier::apply(&mut index, &created("t-1", "grill", TicketStatus::Created), ApplyMode::Live);

        let result = EventApplier::apply_payload(&mut index, b"\x00\x01garbage", ApplyMode::Live);

        assert!(result.is_err());
        assert_eq!(index.len(), 1);
    }
}
