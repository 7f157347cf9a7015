//! In-memory event log for replay tests.

use kitchen_board_core::event::KitchenEvent;
use kitchen_board_core::event_log::{EventLog, EventLogError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct LogState {
    payloads: Vec<Vec<u8>>,
    failure: Option<EventLogError>,
    delay: Option<Duration>,
    last_max: Option<usize>,
}

/// Vec-backed [`EventLog`] with failure and latency injection.
///
/// # Example
///
/// ```
/// use kitchen_board_core::event_log::{EventLog, EventLogError};
/// use kitchen_board_testing::InMemoryEventLog;
///
/// # tokio_test::block_on(async {
/// let log = InMemoryEventLog::new();
/// log.push(b"first".to_vec());
/// log.push(b"second".to_vec());
/// assert_eq!(log.fetch(1).await.unwrap(), vec![b"first".to_vec()]);
///
/// log.fail_with(EventLogError::ConnectionFailed("down".into()));
/// assert!(log.fetch(10).await.is_err());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    state: Arc<Mutex<LogState>>,
    fetches: Arc<AtomicUsize>,
}

impl std::fmt::Debug for InMemoryEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventLog")
            .field("payloads", &self.lock().payloads.len())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log holding `events`, encoded, in order.
    #[must_use]
    pub fn with_events<'a>(events: impl IntoIterator<Item = &'a KitchenEvent>) -> Self {
        let log = Self::new();
        for event in events {
            log.push_event(event);
        }
        log
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a raw payload.
    pub fn push(&self, payload: Vec<u8>) {
        self.lock().payloads.push(payload);
    }

    /// Encode and append a kitchen event.
    ///
    /// # Panics
    ///
    /// Panics if the event cannot be encoded.
    #[allow(clippy::expect_used)]
    pub fn push_event(&self, event: &KitchenEvent) {
        self.push(event.encode().expect("kitchen events always encode"));
    }

    /// Make every later fetch fail with `error`.
    pub fn fail_with(&self, error: EventLogError) {
        self.lock().failure = Some(error);
    }

    /// Delay every later fetch by `delay`.
    pub fn delay_by(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Number of fetch calls so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// `max_messages` of the most recent fetch.
    #[must_use]
    pub fn last_max_messages(&self) -> Option<usize> {
        self.lock().last_max
    }
}

impl EventLog for InMemoryEventLog {
    fn fetch(
        &self,
        max_messages: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<u8>>, EventLogError>> + Send + '_>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let delay = {
                let mut state = self.lock();
                state.last_max = Some(max_messages);
                state.delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let state = self.lock();
            if let Some(error) = &state.failure {
                return Err(error.clone());
            }
            Ok(state.payloads.iter().take(max_messages).cloned().collect())
        })
    }
}
