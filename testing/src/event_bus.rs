//! In-memory event bus for tests.
//!
//! Each subscription gets its own unbounded channel, so messages published
//! after `subscribe` resolves are buffered until the stream is polled, just as
//! a real broker would hold them.

use kitchen_board_core::event::KitchenEvent;
use kitchen_board_core::event_bus::{EventBus, EventBusError, EventStream};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type Sender = mpsc::UnboundedSender<Result<Vec<u8>, EventBusError>>;

#[derive(Default)]
struct BusState {
    subscribers: HashMap<String, Vec<Sender>>,
    published: Vec<(String, Vec<u8>)>,
    subscribe_failure: Option<String>,
}

/// Channel-backed [`EventBus`].
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use kitchen_board_core::event_bus::EventBus;
/// use kitchen_board_testing::InMemoryEventBus;
///
/// # tokio_test::block_on(async {
/// let bus = InMemoryEventBus::new();
/// let mut stream = bus.subscribe(&["kitchen-ticket-events"]).await.unwrap();
///
/// bus.publish("kitchen-ticket-events", b"hello").await.unwrap();
/// assert_eq!(stream.next().await.unwrap().unwrap(), b"hello".to_vec());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<Mutex<BusState>>,
}

impl std::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("InMemoryEventBus")
            .field("topics", &state.subscribers.keys().collect::<Vec<_>>())
            .field("published", &state.published.len())
            .finish()
    }
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later `subscribe` call fail with `reason`.
    pub fn fail_subscriptions(&self, reason: impl Into<String>) {
        self.lock().subscribe_failure = Some(reason.into());
    }

    /// Encode and publish a kitchen event.
    ///
    /// # Panics
    ///
    /// Panics if the event cannot be encoded.
    #[allow(clippy::expect_used)]
    pub fn publish_event(&self, topic: &str, event: &KitchenEvent) {
        let payload = event.encode().expect("kitchen events always encode");
        self.deliver(topic, &payload);
    }

    /// Publish without going through the async trait method.
    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        let mut state = self.lock();
        state.published.push((topic.to_string(), payload.to_vec()));
        if let Some(senders) = state.subscribers.get_mut(topic) {
            senders.retain(|tx| tx.send(Ok(payload.to_vec())).is_ok());
        }
    }

    /// Push a transport error into every subscription on `topic`.
    pub fn inject_error(&self, topic: &str, error: EventBusError) {
        if let Some(senders) = self.lock().subscribers.get_mut(topic) {
            senders.retain(|tx| tx.send(Err(error.clone())).is_ok());
        }
    }

    /// End every subscription stream on `topic`.
    pub fn close(&self, topic: &str) {
        self.lock().subscribers.remove(topic);
    }

    /// Live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .subscribers
            .get(topic)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Everything published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().published.clone()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let payload = payload.to_vec();
        Box::pin(async move {
            self.deliver(&topic, &payload);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        Box::pin(async move {
            let mut state = self.lock();
            if let Some(reason) = &state.subscribe_failure {
                return Err(EventBusError::SubscriptionFailed {
                    topics,
                    reason: reason.clone(),
                });
            }

            let (tx, mut rx) = mpsc::unbounded_channel();
            for topic in topics {
                state.subscribers.entry(topic).or_default().push(tx.clone());
            }
            drop(tx);

            let stream = async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}
