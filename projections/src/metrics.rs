//! Prometheus metrics for the ticket read model.
//!
//! Recording goes through the `metrics` facade, so nothing is exported until the
//! binary installs a recorder. Call [`describe_metrics`] once at start-up to
//! register help text.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Events applied to the cache, labelled by `source` (`replay` or `live`).
pub const EVENTS_APPLIED: &str = "kitchen_cache_events_applied_total";
/// Payloads that were not applied, labelled by `reason`.
pub const EVENTS_DROPPED: &str = "kitchen_cache_events_dropped_total";
/// Tickets removed because they reached a terminal status.
pub const TICKETS_EVICTED: &str = "kitchen_cache_tickets_evicted_total";
/// Current number of cached tickets.
pub const TICKETS: &str = "kitchen_cache_tickets";
/// Duration of a warm-up, any source.
pub const WARM_DURATION: &str = "kitchen_cache_warm_duration_seconds";
/// Completed warm-ups, labelled by `source`.
pub const WARM_TOTAL: &str = "kitchen_cache_warm_total";

/// Register all metric descriptions.
pub fn describe_metrics() {
    describe_counter!(EVENTS_APPLIED, "Total number of ticket events applied to the cache");
    describe_counter!(
        EVENTS_DROPPED,
        "Total number of ticket event payloads dropped (malformed or unknown type)"
    );
    describe_counter!(TICKETS_EVICTED, "Total number of terminal tickets evicted");
    describe_gauge!(TICKETS, "Number of tickets currently cached");
    describe_histogram!(WARM_DURATION, "Time taken to warm the cache");
    describe_counter!(WARM_TOTAL, "Total number of cache warm-ups by source");
}

/// Why a payload was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Not decodable.
    Malformed,
    /// Decodable but of a kind the cache does not handle.
    UnknownType,
}

impl DropReason {
    /// Metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnknownType => "unknown_type",
        }
    }
}

pub(crate) fn record_applied(source: &'static str, count: u64) {
    if count > 0 {
        counter!(EVENTS_APPLIED, "source" => source).increment(count);
    }
}

pub(crate) fn record_dropped(reason: DropReason, count: u64) {
    if count > 0 {
        counter!(EVENTS_DROPPED, "reason" => reason.as_str()).increment(count);
    }
}

pub(crate) fn record_evicted(count: u64) {
    if count > 0 {
        counter!(TICKETS_EVICTED).increment(count);
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn record_size(tickets: usize) {
    gauge!(TICKETS).set(tickets as f64);
}

pub(crate) fn record_warm(source: &'static str, elapsed: Duration) {
    counter!(WARM_TOTAL, "source" => source).increment(1);
    histogram!(WARM_DURATION).record(elapsed.as_secs_f64());
}
