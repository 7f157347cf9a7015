//! Start-up warm-up of the ticket cache.
//!
//! # Sources, in order
//!
//! 1. **Replay**: fetch the retained event history from the [`EventLog`] and
//!    apply it in commit order under one write lock, then evict every terminal
//!    ticket in a single cleanup pass.
//! 2. **HTTP fallback**: if no log is configured, or replay fails or times out,
//!    import the [`TicketSource`] listing. Terminal snapshots are skipped.
//! 3. **Empty**: with neither collaborator configured, warm-up succeeds and the
//!    cache stays as it is.
//!
//! Network calls are bounded by [`WarmConfig`] timeouts. Dropping the `warm`
//! future cancels whichever call is in flight; no lock is held across an await.
//!
//! [`EventLog`]: kitchen_board_core::event_log::EventLog
//! [`TicketSource`]: kitchen_board_core::ticket_source::TicketSource

use crate::applier::{ApplyMode, ApplyOutcome, EventApplier, PayloadOutcome};
use crate::cache::TicketStateCache;
use crate::metrics::{self, DropReason};
use kitchen_board_core::ticket::TicketSnapshot;
use kitchen_board_core::ticket_source::TicketSourceError;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default page size for the replay fetch.
pub const DEFAULT_REPLAY_MAX_MESSAGES: usize = 10_000;

/// Limits applied while warming the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarmConfig {
    /// Upper bound on events fetched for replay.
    pub replay_max_messages: usize,
    /// How long the replay fetch may take before falling back.
    pub replay_timeout: Duration,
    /// How long the fallback listing may take.
    pub fallback_timeout: Duration,
}

impl Default for WarmConfig {
    fn default() -> Self {
        Self {
            replay_max_messages: DEFAULT_REPLAY_MAX_MESSAGES,
            replay_timeout: Duration::from_secs(30),
            fallback_timeout: Duration::from_secs(10),
        }
    }
}

/// Where the warm cache contents came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarmSource {
    /// Event log replay succeeded.
    Replay,
    /// The HTTP listing was imported.
    HttpFallback,
    /// Nothing was configured.
    Empty,
}

impl WarmSource {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::HttpFallback => "http_fallback",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for WarmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a completed warm-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarmReport {
    /// Source that populated the cache.
    pub source: WarmSource,
    /// Events (replay) or snapshots (fallback) written to the cache.
    pub applied: usize,
    /// Payloads not applied: malformed or unknown type on replay, terminal or
    /// id-less snapshots on fallback.
    pub dropped: usize,
    /// Terminal tickets removed by the post-replay cleanup.
    pub evicted: usize,
    /// Tickets in the cache afterwards.
    pub tickets: usize,
}

impl WarmReport {
    const fn empty(tickets: usize) -> Self {
        Self {
            source: WarmSource::Empty,
            applied: 0,
            dropped: 0,
            evicted: 0,
            tickets,
        }
    }
}

/// Errors surfaced by [`TicketStateCache::warm`].
///
/// Replay failures are only surfaced when there is nothing to fall back to.
#[derive(Error, Debug, Clone)]
pub enum WarmError {
    /// The fallback listing failed.
    #[error("Fallback ticket import failed: {0}")]
    Fallback(#[from] TicketSourceError),

    /// The fallback listing did not complete in time.
    #[error("Fallback ticket import timed out after {0:?}")]
    FallbackTimeout(Duration),

    /// Replay failed and no fallback is configured.
    #[error("Replay unavailable and no fallback configured: {0}")]
    ReplayUnavailable(String),
}

impl TicketStateCache {
    /// Populate the cache from replay, falling back to the HTTP listing.
    ///
    /// Existing entries are not cleared; replayed events are applied on top.
    ///
    /// # Errors
    ///
    /// Returns [`WarmError`] when the fallback fails or times out, or when replay
    /// fails with no fallback configured. The cache may be partially warm only
    /// in the sense that it keeps whatever it held before the call.
    pub async fn warm(&self) -> Result<WarmReport, WarmError> {
        let started = Instant::now();
        tracing::info!(
            replay = self.event_log.is_some(),
            fallback = self.ticket_source.is_some(),
            "Warming ticket cache"
        );

        let replay_failure = match self.replay().await {
            Ok(report) => return Ok(self.finish(report, started)),
            Err(ReplayFailure::NotConfigured) => None,
            Err(ReplayFailure::Failed(reason)) => {
                tracing::warn!(reason = %reason, "Replay failed, falling back to ticket listing");
                Some(reason)
            }
        };

        if self.ticket_source.is_some() {
            return match self.import_fallback().await {
                Ok(report) => Ok(self.finish(report, started)),
                Err(e) => {
                    tracing::error!(error = %e, "Fallback ticket import failed");
                    Err(e)
                }
            };
        }

        match replay_failure {
            Some(reason) => {
                tracing::error!(reason = %reason, "No fallback configured, cache not warmed");
                Err(WarmError::ReplayUnavailable(reason))
            }
            None => {
                tracing::info!("No replay log or fallback configured, starting empty");
                Ok(self.finish(WarmReport::empty(self.len()), started))
            }
        }
    }

    async fn replay(&self) -> Result<WarmReport, ReplayFailure> {
        let Some(event_log) = self.event_log.as_ref().map(Arc::clone) else {
            return Err(ReplayFailure::NotConfigured);
        };
        let max = self.warm_config.replay_max_messages;

        let payloads = tokio::time::timeout(self.warm_config.replay_timeout, event_log.fetch(max))
            .await
            .map_err(|_| {
                ReplayFailure::Failed(format!(
                    "fetch timed out after {:?}",
                    self.warm_config.replay_timeout
                ))
            })?
            .map_err(|e| ReplayFailure::Failed(e.to_string()))?;

        if payloads.len() >= max {
            tracing::warn!(
                max_messages = max,
                "Replay fetched the maximum number of messages, history may be truncated"
            );
        }
        tracing::debug!(messages = payloads.len(), "Replaying ticket events");

        Ok(self.apply_replay_batch(&payloads))
    }

    fn apply_replay_batch(&self, payloads: &[Vec<u8>]) -> WarmReport {
        let mut applied = 0;
        let mut malformed = 0;
        let mut unknown = 0;

        let (evicted, tickets) = {
            let mut index = self.write();
            for payload in payloads {
                match EventApplier::apply_payload(&mut index, payload, ApplyMode::Replay) {
                    Ok(PayloadOutcome::Applied(ApplyOutcome::Unchanged)) => {}
                    Ok(PayloadOutcome::Applied(_)) => applied += 1,
                    Ok(PayloadOutcome::Ignored(event_type)) => {
                        unknown += 1;
                        tracing::debug!(event_type = %event_type, "Ignoring unknown event type during replay");
                    }
                    Err(e) => {
                        malformed += 1;
                        tracing::warn!(error = %e, bytes = payload.len(), "Dropping malformed event during replay");
                    }
                }
            }
            let evicted = index.evict_terminal();
            (evicted, index.len())
        };

        metrics::record_applied(ApplyMode::Replay.as_str(), applied as u64);
        metrics::record_dropped(DropReason::Malformed, malformed as u64);
        metrics::record_dropped(DropReason::UnknownType, unknown as u64);
        metrics::record_evicted(evicted as u64);

        WarmReport {
            source: WarmSource::Replay,
            applied,
            dropped: malformed + unknown,
            evicted,
            tickets,
        }
    }

    async fn import_fallback(&self) -> Result<WarmReport, WarmError> {
        let Some(source) = self.ticket_source.as_ref().map(Arc::clone) else {
            return Ok(WarmReport::empty(self.len()));
        };
        let timeout = self.warm_config.fallback_timeout;

        let snapshots = tokio::time::timeout(timeout, source.list_active_tickets())
            .await
            .map_err(|_| WarmError::FallbackTimeout(timeout))??;

        Ok(self.import_snapshots(snapshots))
    }

    fn import_snapshots(&self, snapshots: Vec<TicketSnapshot>) -> WarmReport {
        let mut applied = 0;
        let mut dropped = 0;
        let mut untimed = 0;

        let tickets = {
            let mut index = self.write();
            for snapshot in snapshots {
                if snapshot.ticket_id.is_empty() || snapshot.status.is_terminal() {
                    dropped += 1;
                    continue;
                }
                // Query order depends on created_at; never invent one.
                let (Some(created_at), Some(_)) = (snapshot.created_at, snapshot.updated_at) else {
                    untimed += 1;
                    continue;
                };
                index.set(Arc::new(snapshot.into_record(created_at)));
                applied += 1;
            }
            index.len()
        };

        if dropped > 0 {
            tracing::debug!(skipped = dropped, "Skipped terminal or id-less tickets from fallback listing");
        }
        if untimed > 0 {
            tracing::warn!(skipped = untimed, "Skipped fallback tickets without created_at/updated_at");
        }
        dropped += untimed;

        WarmReport {
            source: WarmSource::HttpFallback,
            applied,
            dropped,
            evicted: 0,
            tickets,
        }
    }

    fn finish(&self, report: WarmReport, started: Instant) -> WarmReport {
        let elapsed = started.elapsed();
        metrics::record_warm(report.source.as_str(), elapsed);
        metrics::record_size(report.tickets);
        tracing::info!(
            source = %report.source,
            applied = report.applied,
            dropped = report.dropped,
            evicted = report.evicted,
            tickets = report.tickets,
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Ticket cache warmed"
        );
        report
    }
}

enum ReplayFailure {
    NotConfigured,
    Failed(String),
}
