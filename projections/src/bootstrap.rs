//! Ordered start-up: subscribe, warm, then pump.
//!
//! Subscribing before the replay fetch narrows the window in which an event
//! committed after the fetch boundary but before the subscription would be
//! lost. It only closes it when `subscribe` returns after the transport has
//! fixed its starting position; the Redpanda bus waits for a partition
//! assignment (bounded by its assignment timeout) for that reason. The
//! transport buffers live messages while `warm` runs; the pump then applies
//! them on top of the replayed state. Events present in both are applied twice
//! in the same relative order, which converges.
//!
//! A failed warm-up hands the established subscription back inside the error,
//! so a caller that starts degraded keeps everything buffered since subscribe.

use crate::subscriber::{LiveSubscriber, SubscriberError, Subscription};
use crate::warm::{WarmError, WarmReport};
use thiserror::Error;
use tokio::task::JoinHandle;

/// A warmed cache with its live pump, if any.
#[derive(Debug)]
pub struct Bootstrapped {
    /// What warm-up did.
    pub report: WarmReport,
    /// The live pump, or `None` without an event bus.
    pub handle: Option<JoinHandle<()>>,
}

/// Errors from [`LiveSubscriber::bootstrap`].
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Warm-up failed.
    #[error("Cache warm-up failed: {source}")]
    Warm {
        /// Why warm-up failed.
        #[source]
        source: WarmError,
        /// The subscription made before warming, not yet pumping. `None`
        /// without an event bus or when subscribing failed too.
        subscription: Option<Subscription>,
    },

    /// Warm-up ran but live updates could not be started.
    #[error("Cache warmed from {} but live updates are unavailable: {source}", report.source)]
    Subscribe {
        /// The completed warm-up.
        report: WarmReport,
        /// Why the subscription failed.
        #[source]
        source: SubscriberError,
    },
}

impl LiveSubscriber {
    /// Subscribe, warm the cache, then start applying live messages.
    ///
    /// A subscription failure does not prevent warm-up; the cache is still
    /// warmed and the error reports the warm result alongside the cause.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Warm`] if warm-up fails, carrying the
    /// subscription so live updates can still start from the subscribe point,
    /// and [`BootstrapError::Subscribe`] if the live subscription could not be
    /// made.
    pub async fn bootstrap(&self) -> Result<Bootstrapped, BootstrapError> {
        let subscription = self.subscribe().await;
        if let Err(e) = &subscription {
            tracing::error!(error = %e, "Live subscription failed, warming anyway");
        }

        let report = match self.cache().warm().await {
            Ok(report) => report,
            Err(source) => {
                return Err(BootstrapError::Warm {
                    source,
                    subscription: subscription.ok().flatten(),
                })
            }
        };

        match subscription {
            Ok(subscription) => Ok(Bootstrapped {
                report,
                handle: subscription.map(Subscription::spawn),
            }),
            Err(source) => Err(BootstrapError::Subscribe { report, source }),
        }
    }
}
