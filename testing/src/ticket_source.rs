//! Canned ticket listing for fallback tests.

use kitchen_board_core::ticket::TicketSnapshot;
use kitchen_board_core::ticket_source::{TicketSource, TicketSourceError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// [`TicketSource`] answering every call with the same result.
#[derive(Clone, Debug)]
pub struct StaticTicketSource {
    result: Result<Vec<TicketSnapshot>, TicketSourceError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticTicketSource {
    /// A source listing `tickets`.
    #[must_use]
    pub fn new(tickets: Vec<TicketSnapshot>) -> Self {
        Self {
            result: Ok(tickets),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always fails with `error`.
    #[must_use]
    pub fn failing(error: TicketSourceError) -> Self {
        Self {
            result: Err(error),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer only after `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of listing calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TicketSource for StaticTicketSource {
    fn list_active_tickets(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TicketSnapshot>, TicketSourceError>> + Send + '_>>
    {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.clone()
        })
    }
}
