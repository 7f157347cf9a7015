//! The in-memory ticket read model.
//!
//! [`TicketStateCache`] wraps a [`TicketIndex`] in a `std::sync::RwLock`. Every
//! mutation takes the write lock once and updates the primary map and both
//! secondary indexes together, so readers never observe a half-applied write.
//! The lock is never held across an `.await`.
//!
//! Records are handed out as `Arc<TicketRecord>`: cloning a query result is a
//! reference-count bump, and a record a reader holds never changes.
//!
//! # Example
//!
//! ```
//! use kitchen_board_core::ticket::{TicketRecord, TicketStatus};
//! use kitchen_board_core::Utc;
//! use kitchen_board_projections::TicketStateCache;
//!
//! let cache = TicketStateCache::new();
//! cache.set(TicketRecord::minimal("t-1", "grill", TicketStatus::Started, Utc::now()));
//!
//! assert_eq!(cache.get_by_station("grill").len(), 1);
//! assert!(cache.get_by_station("bar").is_empty());
//! ```

use crate::applier::{ApplyMode, ApplyOutcome, EventApplier, PayloadOutcome};
use crate::index::TicketIndex;
use crate::metrics::{self, DropReason};
use crate::warm::WarmConfig;
use kitchen_board_core::event::{EventError, KitchenEvent};
use kitchen_board_core::event_log::EventLog;
use kitchen_board_core::ticket::{TicketRecord, TicketStatus};
use kitchen_board_core::ticket_source::TicketSource;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Concurrent, indexed store of active kitchen tickets.
///
/// Share it as `Arc<TicketStateCache>`; all methods take `&self`.
pub struct TicketStateCache {
    index: RwLock<TicketIndex>,
    pub(crate) event_log: Option<Arc<dyn EventLog>>,
    pub(crate) ticket_source: Option<Arc<dyn TicketSource>>,
    pub(crate) warm_config: WarmConfig,
}

impl Default for TicketStateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TicketStateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketStateCache")
            .field("tickets", &self.len())
            .field("event_log", &self.event_log.is_some())
            .field("ticket_source", &self.ticket_source.is_some())
            .field("warm_config", &self.warm_config)
            .finish()
    }
}

impl TicketStateCache {
    /// Create an empty cache with no warm-up collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: RwLock::new(TicketIndex::new()),
            event_log: None,
            ticket_source: None,
            warm_config: WarmConfig::default(),
        }
    }

    /// Use `event_log` as the primary warm-up source.
    #[must_use]
    pub fn with_event_log(mut self, event_log: Arc<dyn EventLog>) -> Self {
        self.event_log = Some(event_log);
        self
    }

    /// Use `ticket_source` when replay is unavailable.
    #[must_use]
    pub fn with_ticket_source(mut self, ticket_source: Arc<dyn TicketSource>) -> Self {
        self.ticket_source = Some(ticket_source);
        self
    }

    /// Override replay limits and timeouts.
    #[must_use]
    pub const fn with_warm_config(mut self, config: WarmConfig) -> Self {
        self.warm_config = config;
        self
    }

    /// Warm-up settings in effect.
    #[must_use]
    pub const fn warm_config(&self) -> &WarmConfig {
        &self.warm_config
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TicketIndex> {
        self.index
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TicketIndex> {
        self.index
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Look up one ticket.
    #[must_use]
    pub fn get(&self, ticket_id: &str) -> Option<Arc<TicketRecord>> {
        self.read().get(ticket_id).cloned()
    }

    /// Insert or replace a ticket by id.
    ///
    /// A record with an empty `ticket_id` is ignored.
    pub fn set(&self, record: TicketRecord) {
        if record.ticket_id.is_empty() {
            tracing::debug!("Ignoring ticket record without id");
            return;
        }
        let mut index = self.write();
        index.set(Arc::new(record));
        metrics::record_size(index.len());
    }

    /// Remove a ticket. Removing an unknown id is a no-op.
    pub fn remove(&self, ticket_id: &str) -> Option<Arc<TicketRecord>> {
        let mut index = self.write();
        let removed = index.remove(ticket_id);
        if removed.is_some() {
            metrics::record_size(index.len());
        }
        removed
    }

    /// Every cached ticket, ordered by `(created_at, ticket_id)`.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<TicketRecord>> {
        self.read().all()
    }

    /// Tickets routed to `station`.
    #[must_use]
    pub fn get_by_station(&self, station: &str) -> Vec<Arc<TicketRecord>> {
        self.read().by_station(station)
    }

    /// Tickets currently in `status`.
    #[must_use]
    pub fn get_by_status(&self, status: TicketStatus) -> Vec<Arc<TicketRecord>> {
        self.read().by_status(status)
    }

    /// Tickets at `station` in `status`.
    #[must_use]
    pub fn get_by_station_and_status(
        &self,
        station: &str,
        status: TicketStatus,
    ) -> Vec<Arc<TicketRecord>> {
        self.read().by_station_and_status(station, status)
    }

    /// Number of cached tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether `ticket_id` is cached.
    #[must_use]
    pub fn contains(&self, ticket_id: &str) -> bool {
        self.read().contains(ticket_id)
    }

    /// Stations with at least one cached ticket, sorted.
    #[must_use]
    pub fn stations(&self) -> Vec<String> {
        self.read().stations()
    }

    /// Ticket count per status. Statuses with no tickets are omitted.
    #[must_use]
    pub fn count_by_status(&self) -> BTreeMap<TicketStatus, usize> {
        self.read().count_by_status()
    }

    /// Drop every ticket.
    pub fn clear(&self) {
        self.write().clear();
        metrics::record_size(0);
    }

    /// Apply one live event.
    ///
    /// Terminal statuses remove the ticket immediately.
    pub fn apply(&self, event: &KitchenEvent) -> ApplyOutcome {
        let (outcome, size) = {
            let mut index = self.write();
            let outcome = EventApplier::apply(&mut index, event, ApplyMode::Live);
            (outcome, index.len())
        };
        record_outcome(ApplyMode::Live, outcome, size);
        tracing::trace!(
            ticket_id = event.ticket_id(),
            event_type = event.event_type(),
            outcome = ?outcome,
            "Applied live event"
        );
        outcome
    }

    /// Decode and apply one live payload.
    ///
    /// Unknown event types are skipped and reported as [`PayloadOutcome::Ignored`].
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if the payload is malformed; the cache is unchanged.
    pub fn apply_payload(&self, payload: &[u8]) -> Result<PayloadOutcome, EventError> {
        let result = {
            let mut index = self.write();
            EventApplier::apply_payload(&mut index, payload, ApplyMode::Live)
                .map(|outcome| (outcome, index.len()))
        };

        match result {
            Ok((PayloadOutcome::Applied(outcome), size)) => {
                record_outcome(ApplyMode::Live, outcome, size);
                Ok(PayloadOutcome::Applied(outcome))
            }
            Ok((PayloadOutcome::Ignored(event_type), _)) => {
                metrics::record_dropped(DropReason::UnknownType, 1);
                tracing::debug!(event_type = %event_type, "Ignoring unknown event type");
                Ok(PayloadOutcome::Ignored(event_type))
            }
            Err(e) => {
                metrics::record_dropped(DropReason::Malformed, 1);
                Err(e)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn verify(&self) -> Result<(), String> {
        self.read().verify()
    }
}

fn record_outcome(mode: ApplyMode, outcome: ApplyOutcome, size: usize) {
    match outcome {
        ApplyOutcome::Unchanged => {}
        ApplyOutcome::Evicted => {
            metrics::record_applied(mode.as_str(), 1);
            metrics::record_evicted(1);
        }
        ApplyOutcome::Inserted | ApplyOutcome::InsertedMinimal | ApplyOutcome::Updated => {
            metrics::record_applied(mode.as_str(), 1);
        }
    }
    metrics::record_size(size);
}
