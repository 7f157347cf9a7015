//! Live ticket updates from the event bus.
//!
//! [`LiveSubscriber`] subscribes to the kitchen ticket topic and pumps every
//! message through [`CacheEventHandler`] into the shared cache, one message and
//! one write lock at a time.
//!
//! # Lifecycle
//!
//! ```text
//! subscribe() ──► Subscription ──spawn()──► pump task
//!                                              │
//!           stop() / subscriber dropped ───────┤
//!           stream ends ───────────────────────┴──► task returns
//! ```
//!
//! Subscribing and pumping are split so a caller can establish the
//! subscription, do other work while the transport buffers messages, and only
//! then start applying them. `bootstrap` relies on this.
//!
//! Handler errors (malformed payloads) and stream item errors are logged and
//! skipped; neither ends the pump.

use crate::cache::TicketStateCache;
use futures::StreamExt;
use kitchen_board_core::event_bus::{
    EventBus, EventBusError, EventHandler, EventHandlerError, EventStream,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Well-known topic carrying kitchen ticket events.
pub const DEFAULT_TOPIC: &str = "kitchen-ticket-events";

/// Errors from starting the live subscription.
#[derive(Error, Debug, Clone)]
pub enum SubscriberError {
    /// The bus refused the subscription.
    #[error("Failed to subscribe to '{topic}': {source}")]
    Subscribe {
        /// Topic that was requested.
        topic: String,
        /// Underlying bus error.
        #[source]
        source: EventBusError,
    },
}

/// Applies raw bus messages to a [`TicketStateCache`].
#[derive(Clone, Debug)]
pub struct CacheEventHandler {
    cache: Arc<TicketStateCache>,
}

impl CacheEventHandler {
    /// Handler writing into `cache`.
    #[must_use]
    pub const fn new(cache: Arc<TicketStateCache>) -> Self {
        Self { cache }
    }
}

impl EventHandler for CacheEventHandler {
    fn handle<'a>(
        &'a self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventHandlerError>> + Send + 'a>> {
        Box::pin(async move {
            self.cache
                .apply_payload(payload)
                .map(|_| ())
                .map_err(|e| EventHandlerError(e.to_string()))
        })
    }
}

/// Keeps the cache current from the live ticket topic.
///
/// Without an event bus the subscriber is inert: [`start`](Self::start)
/// returns `Ok(None)` and the cache stays as warm-up left it.
pub struct LiveSubscriber {
    cache: Arc<TicketStateCache>,
    event_bus: Option<Arc<dyn EventBus>>,
    topic: String,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for LiveSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSubscriber")
            .field("topic", &self.topic)
            .field("event_bus", &self.event_bus.is_some())
            .field("stopped", &*self.shutdown.borrow())
            .finish_non_exhaustive()
    }
}

impl LiveSubscriber {
    /// Subscriber for [`DEFAULT_TOPIC`].
    #[must_use]
    pub fn new(cache: Arc<TicketStateCache>, event_bus: Option<Arc<dyn EventBus>>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            cache,
            event_bus,
            topic: DEFAULT_TOPIC.to_string(),
            shutdown,
        }
    }

    /// Subscribe to `topic` instead of the default.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Topic this subscriber listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Cache this subscriber writes into.
    #[must_use]
    pub const fn cache(&self) -> &Arc<TicketStateCache> {
        &self.cache
    }

    /// Establish the subscription without applying anything yet.
    ///
    /// Returns `Ok(None)` when no event bus is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Subscribe`] if the bus rejects the subscription.
    pub async fn subscribe(&self) -> Result<Option<Subscription>, SubscriberError> {
        let Some(event_bus) = &self.event_bus else {
            tracing::info!(topic = %self.topic, "No event bus configured, live updates disabled");
            return Ok(None);
        };

        let stream = event_bus
            .subscribe(&[self.topic.as_str()])
            .await
            .map_err(|source| SubscriberError::Subscribe {
                topic: self.topic.clone(),
                source,
            })?;

        tracing::info!(topic = %self.topic, "Subscribed to live ticket events");

        Ok(Some(Subscription {
            topic: self.topic.clone(),
            stream,
            handler: Arc::new(CacheEventHandler::new(Arc::clone(&self.cache))),
            shutdown: self.shutdown.subscribe(),
        }))
    }

    /// Subscribe and spawn the pump task.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Subscribe`] if the bus rejects the subscription.
    pub async fn start(&self) -> Result<Option<JoinHandle<()>>, SubscriberError> {
        Ok(self.subscribe().await?.map(Subscription::spawn))
    }

    /// Signal every pump started by this subscriber to exit.
    ///
    /// Pumps notice the signal between messages. Subscriptions created after
    /// `stop` exit immediately.
    pub fn stop(&self) {
        tracing::info!(topic = %self.topic, "Stopping live ticket subscription");
        self.shutdown.send_replace(true);
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// An established subscription whose messages have not been applied yet.
pub struct Subscription {
    topic: String,
    stream: EventStream,
    handler: Arc<dyn EventHandler>,
    shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Run the pump as a background task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Apply messages until stopped or the stream ends.
    pub async fn run(mut self) {
        tracing::info!(topic = %self.topic, "Live ticket subscription started");

        loop {
            if *self.shutdown.borrow_and_update() {
                tracing::info!(topic = %self.topic, "Shutdown signal received");
                break;
            }

            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        tracing::info!(topic = %self.topic, "Subscriber dropped, stopping");
                        break;
                    }
                }

                item = self.stream.next() => {
                    match item {
                        Some(Ok(payload)) => {
                            tracing::trace!(topic = %self.topic, bytes = payload.len(), "Received ticket event");
                            if let Err(e) = self.handler.handle(&payload).await {
                                tracing::warn!(topic = %self.topic, error = %e, "Dropping ticket event");
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!(topic = %self.topic, error = %e, "Error receiving event from stream");
                        }
                        None => {
                            tracing::warn!(topic = %self.topic, "Live ticket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(topic = %self.topic, "Live ticket subscription stopped");
    }
}
