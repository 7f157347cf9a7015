//! Primary ticket table with its station and status indexes.
//!
//! [`TicketIndex`] is the unlocked state behind `TicketStateCache`. It owns one
//! primary map keyed by ticket id and two secondary indexes:
//!
//! ```text
//! tickets:    ticket_id ──► Arc<TicketRecord>
//! by_station: station   ──► {ticket_id, ...}
//! by_status:  status    ──► {ticket_id, ...}
//! ```
//!
//! Every mutation goes through [`TicketIndex::set`] or [`TicketIndex::remove`],
//! which keep the indexes in step with the primary map:
//!
//! - a ticket with station `s` and status `t` is listed under `by_station[s]`
//!   and `by_status[t]` and under no other bucket
//! - an id absent from the primary map appears in no bucket
//! - empty buckets are dropped

use kitchen_board_core::ticket::{TicketRecord, TicketStatus};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Ticket storage with station and status indexes. Not synchronised.
#[derive(Debug, Default, Clone)]
pub struct TicketIndex {
    tickets: HashMap<String, Arc<TicketRecord>>,
    by_station: HashMap<String, HashSet<String>>,
    by_status: HashMap<TicketStatus, HashSet<String>>,
}

impl TicketIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a ticket by id.
    #[must_use]
    pub fn get(&self, ticket_id: &str) -> Option<&Arc<TicketRecord>> {
        self.tickets.get(ticket_id)
    }

    /// Whether a ticket with this id is stored.
    #[must_use]
    pub fn contains(&self, ticket_id: &str) -> bool {
        self.tickets.contains_key(ticket_id)
    }

    /// Number of stored tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Whether no tickets are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Insert or replace a ticket, re-indexing it under its current station and status.
    ///
    /// A record with an empty `ticket_id` is ignored. Returns the record that was
    /// replaced, if any.
    pub fn set(&mut self, record: Arc<TicketRecord>) -> Option<Arc<TicketRecord>> {
        if record.ticket_id.is_empty() {
            return None;
        }

        let previous = self.tickets.remove(&record.ticket_id);
        if let Some(old) = &previous {
            self.unindex(old);
        }

        self.index(&record);
        self.tickets.insert(record.ticket_id.clone(), record);
        previous
    }

    /// Remove a ticket from the primary map and both indexes.
    pub fn remove(&mut self, ticket_id: &str) -> Option<Arc<TicketRecord>> {
        let removed = self.tickets.remove(ticket_id)?;
        self.unindex(&removed);
        Some(removed)
    }

    /// Remove every ticket in a terminal status. Returns how many were removed.
    pub fn evict_terminal(&mut self) -> usize {
        let terminal: Vec<String> = TicketStatus::ALL
            .into_iter()
            .filter(|status| status.is_terminal())
            .filter_map(|status| self.by_status.get(&status))
            .flatten()
            .cloned()
            .collect();

        for ticket_id in &terminal {
            self.remove(ticket_id);
        }
        terminal.len()
    }

    /// Drop all tickets.
    pub fn clear(&mut self) {
        self.tickets.clear();
        self.by_station.clear();
        self.by_status.clear();
    }

    /// All tickets, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<TicketRecord>> {
        sorted(self.tickets.values().cloned().collect())
    }

    /// Tickets routed to `station`, oldest first.
    #[must_use]
    pub fn by_station(&self, station: &str) -> Vec<Arc<TicketRecord>> {
        self.by_station
            .get(station)
            .map(|ids| self.resolve(ids.iter()))
            .unwrap_or_default()
    }

    /// Tickets in `status`, oldest first.
    #[must_use]
    pub fn by_status(&self, status: TicketStatus) -> Vec<Arc<TicketRecord>> {
        self.by_status
            .get(&status)
            .map(|ids| self.resolve(ids.iter()))
            .unwrap_or_default()
    }

    /// Tickets at `station` in `status`, oldest first.
    ///
    /// Scans the station bucket and filters by status; station buckets are small.
    #[must_use]
    pub fn by_station_and_status(
        &self,
        station: &str,
        status: TicketStatus,
    ) -> Vec<Arc<TicketRecord>> {
        self.by_station
            .get(station)
            .map(|ids| {
                sorted(
                    ids.iter()
                        .filter_map(|id| self.tickets.get(id))
                        .filter(|record| record.status == status)
                        .cloned()
                        .collect(),
                )
            })
            .unwrap_or_default()
    }

    /// Station codes that currently hold at least one ticket, sorted.
    #[must_use]
    pub fn stations(&self) -> Vec<String> {
        let mut stations: Vec<String> = self.by_station.keys().cloned().collect();
        stations.sort();
        stations
    }

    /// Ticket count per status. Statuses with no tickets are omitted.
    #[must_use]
    pub fn count_by_status(&self) -> BTreeMap<TicketStatus, usize> {
        self.by_status
            .iter()
            .map(|(status, ids)| (*status, ids.len()))
            .collect()
    }

    fn index(&mut self, record: &TicketRecord) {
        self.by_station
            .entry(record.station.clone())
            .or_default()
            .insert(record.ticket_id.clone());
        self.by_status
            .entry(record.status)
            .or_default()
            .insert(record.ticket_id.clone());
    }

    fn unindex(&mut self, record: &TicketRecord) {
        if let Some(ids) = self.by_station.get_mut(&record.station) {
            ids.remove(&record.ticket_id);
            if ids.is_empty() {
                self.by_station.remove(&record.station);
            }
        }
        if let Some(ids) = self.by_status.get_mut(&record.status) {
            ids.remove(&record.ticket_id);
            if ids.is_empty() {
                self.by_status.remove(&record.status);
            }
        }
    }

    fn resolve<'a>(&self, ids: impl Iterator<Item = &'a String>) -> Vec<Arc<TicketRecord>> {
        sorted(ids.filter_map(|id| self.tickets.get(id)).cloned().collect())
    }

    /// Check that the indexes exactly mirror the primary map.
    ///
    /// Returns a description of the first inconsistency found.
    ///
    /// # Errors
    ///
    /// Returns `Err` describing a stale, missing or misfiled index entry.
    pub fn verify(&self) -> Result<(), String> {
        for (id, record) in &self.tickets {
            if id != &record.ticket_id {
                return Err(format!("ticket stored under {id} has id {}", record.ticket_id));
            }
            if !self.by_station.get(&record.station).is_some_and(|ids| ids.contains(id)) {
                return Err(format!("{id} missing from station {}", record.station));
            }
            if !self.by_status.get(&record.status).is_some_and(|ids| ids.contains(id)) {
                return Err(format!("{id} missing from status {}", record.status));
            }
        }

        for (station, ids) in &self.by_station {
            if ids.is_empty() {
                return Err(format!("empty station bucket {station}"));
            }
            for id in ids {
                match self.tickets.get(id) {
                    Some(record) if &record.station == station => {}
                    Some(_) => return Err(format!("{id} misfiled under station {station}")),
                    None => return Err(format!("stale {id} under station {station}")),
                }
            }
        }

        for (status, ids) in &self.by_status {
            if ids.is_empty() {
                return Err(format!("empty status bucket {status}"));
            }
            for id in ids {
                match self.tickets.get(id) {
                    Some(record) if record.status == *status => {}
                    Some(_) => return Err(format!("{id} misfiled under status {status}")),
                    None => return Err(format!("stale {id} under status {status}")),
                }
            }
        }

        Ok(())
    }
}

fn sorted(mut records: Vec<Arc<TicketRecord>>) -> Vec<Arc<TicketRecord>> {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.ticket_id.cmp(&b.ticket_id))
    });
    records
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap()
    }

    fn ticket(id: &str, station: &str, status: TicketStatus) -> Arc<TicketRecord> {
        Arc::new(TicketRecord::minimal(id, station, status, at(0)))
    }

    fn ids(records: &[Arc<TicketRecord>]) -> Vec<&str> {
        records.iter().map(|r| r.ticket_id.as_str()).collect()
    }

    #[test]
    fn set_moves_ticket_between_station_buckets() {
        let mut index = TicketIndex::new();
        index.set(ticket("x", "grill", TicketStatus::Created));
        index.set(ticket("x", "prep", TicketStatus::Created));

        assert!(index.by_station("grill").is_empty());
        assert_eq!(ids(&index.by_station("prep")), vec!["x"]);
        assert_eq!(index.stations(), vec!["prep".to_string()]);
        index.verify().unwrap();
    }

    #[test]
    fn set_moves_ticket_between_status_buckets() {
        let mut index = TicketIndex::new();
        index.set(ticket("x", "grill", TicketStatus::Created));
        let previous = index.set(ticket("x", "grill", TicketStatus::Ready));

        assert_eq!(previous.unwrap().status, TicketStatus::Created);
        assert!(index.by_status(TicketStatus::Created).is_empty());
        assert_eq!(ids(&index.by_status(TicketStatus::Ready)), vec!["x"]);
        assert_eq!(index.len(), 1);
        index.verify().unwrap();
    }

    #[test]
    fn empty_id_is_ignored() {
        let mut index = TicketIndex::new();
        assert!(index.set(ticket("", "grill", TicketStatus::Created)).is_none());
        assert!(index.is_empty());
        assert!(index.stations().is_empty());
    }

    #[test]
    fn remove_clears_every_index() {
        let mut index = TicketIndex::new();
        index.set(ticket("ticket-1", "grill", TicketStatus::Created));
        index.set(ticket("ticket-2", "grill", TicketStatus::Created));

        assert!(index.remove("ticket-1").is_some());
        assert!(index.remove("ticket-1").is_none());

        assert!(index.get("ticket-1").is_none());
        assert_eq!(ids(&index.by_station("grill")), vec!["ticket-2"]);
        assert_eq!(ids(&index.by_status(TicketStatus::Created)), vec!["ticket-2"]);
        index.verify().unwrap();
    }

    #[test]
    fn evict_terminal_keeps_active_tickets() {
        let mut index = TicketIndex::new();
        index.set(ticket("a", "grill", TicketStatus::Created));
        index.set(ticket("b", "grill", TicketStatus::Delivered));
        index.set(ticket("c", "bar", TicketStatus::Cancelled));
        index.set(ticket("d", "bar", TicketStatus::Ready));

        assert_eq!(index.evict_terminal(), 2);
        assert_eq!(ids(&index.all()), vec!["a", "d"]);
        assert!(index.by_status(TicketStatus::Delivered).is_empty());
        index.verify().unwrap();
    }

    #[test]
    fn station_and_status_filters_the_station_bucket() {
        let mut index = TicketIndex::new();
        index.set(ticket("a", "grill", TicketStatus::Created));
        index.set(ticket("b", "grill", TicketStatus::Started));
        index.set(ticket("c", "bar", TicketStatus::Started));

        assert_eq!(
            ids(&index.by_station_and_status("grill", TicketStatus::Started)),
            vec!["b"]
        );
        assert!(index
            .by_station_and_status("pastry", TicketStatus::Started)
            .is_empty());
    }

    #[test]
    fn results_are_ordered_by_creation_then_id() {
        let mut index = TicketIndex::new();
        index.set(Arc::new(TicketRecord::minimal("a", "grill", TicketStatus::Created, at(10))));
        index.set(Arc::new(TicketRecord::minimal("c", "grill", TicketStatus::Created, at(1))));
        index.set(Arc::new(TicketRecord::minimal("b", "grill", TicketStatus::Created, at(1))));

        assert_eq!(ids(&index.by_station("grill")), vec!["b", "c", "a"]);
    }

    #[test]
    fn count_by_status_omits_empty_statuses() {
        let mut index = TicketIndex::new();
        index.set(ticket("a", "grill", TicketStatus::Created));
        index.set(ticket("b", "bar", TicketStatus::Created));
        index.set(ticket("c", "bar", TicketStatus::Ready));

        let counts = index.count_by_status();
        assert_eq!(counts.get(&TicketStatus::Created), Some(&2));
        assert_eq!(counts.get(&TicketStatus::Ready), Some(&1));
        assert!(!counts.contains_key(&TicketStatus::Started));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Set { id: u8, station: u8, status: TicketStatus },
        Remove { id: u8 },
        EvictTerminal,
    }

    fn op() -> impl Strategy<Value = Op> {
        let status = proptest::sample::select(TicketStatus::ALL.to_vec());
        prop_oneof![
            6 => (0u8..8, 0u8..3, status).prop_map(|(id, station, status)| Op::Set { id, station, status }),
            3 => (0u8..8).prop_map(|id| Op::Remove { id }),
            1 => Just(Op::EvictTerminal),
        ]
    }

    proptest! {
        #[test]
        fn indexes_mirror_primary_map_after_every_operation(ops in proptest::collection::vec(op(), 0..64)) {
            let mut index = TicketIndex::new();
            for op in ops {
                match op {
                    Op::Set { id, station, status } => {
                        index.set(ticket(&format!("t-{id}"), &format!("s-{station}"), status));
                    }
                    Op::Remove { id } => {
                        index.remove(&format!("t-{id}"));
                    }
                    Op::EvictTerminal => {
                        index.evict_terminal();
                    }
                }
                prop_assert_eq!(index.verify(), Ok(()));

                let by_station: usize = index.stations().iter().map(|s| index.by_station(s).len()).sum();
                let by_status: usize = index.count_by_status().values().sum();
                prop_assert_eq!(by_station, index.len());
                prop_assert_eq!(by_status, index.len());
            }
        }
    }
}
