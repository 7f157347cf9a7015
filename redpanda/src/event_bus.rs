//! Live ticket events over a Kafka-compatible broker.

use futures::StreamExt;
use kitchen_board_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::client::ClientContext;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Deserialize)]
struct KeyFields {
    #[serde(default)]
    ticket_id: Option<String>,
}

/// Message key for a ticket event payload: its `ticket_id`, if it has one.
///
/// Keying by ticket keeps every event of a ticket on one partition.
///
/// ```
/// use kitchen_board_redpanda::partition_key;
///
/// let payload = br#"{"event_type":"kitchen.ticket.status_changed","ticket_id":"t-1"}"#;
/// assert_eq!(partition_key(payload).as_deref(), Some("t-1"));
/// assert_eq!(partition_key(b"not json"), None);
/// ```
#[must_use]
pub fn partition_key(payload: &[u8]) -> Option<String> {
    serde_json::from_slice::<KeyFields>(payload)
        .ok()
        .and_then(|fields| fields.ticket_id)
        .filter(|id| !id.is_empty())
}

/// Signals the first partition assignment of a live consumer.
struct AssignmentContext {
    assigned: watch::Sender<bool>,
}

impl ClientContext for AssignmentContext {}

impl ConsumerContext for AssignmentContext {
    fn post_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        if let Rebalance::Assign(partitions) = rebalance {
            tracing::debug!(partitions = partitions.count(), "Partitions assigned");
            self.assigned.send_replace(true);
        }
    }
}

type LiveConsumer = StreamConsumer<AssignmentContext>;

/// Redpanda event bus.
///
/// - **At-least-once delivery**: offsets are committed only after a message has
///   been handed to the subscriber's channel
/// - **Positioned subscriptions**: `subscribe` resolves once the group has
///   assigned partitions (or the assignment timeout passes), so the starting
///   offsets are fixed before the caller does anything else
/// - **Ordering per ticket**: payloads are keyed by `ticket_id`
/// - **Consumer groups**: instances sharing a group split the partitions
///
/// # Example
///
/// ```no_run
/// use kitchen_board_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .consumer_group("kitchen-board-cache")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    /// Kafka producer for publishing events
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Producer timeout
    timeout: Duration,
    /// Consumer group ID (if explicitly set)
    consumer_group: Option<String>,
    /// Payload buffer size for subscribers
    buffer_size: usize,
    /// Auto offset reset policy
    auto_offset_reset: String,
    /// How long `subscribe` waits for a partition assignment
    assignment_timeout: Duration,
}

impl std::fmt::Debug for RedpandaEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaEventBus")
            .field("brokers", &self.brokers)
            .field("consumer_group", &self.consumer_group)
            .field("buffer_size", &self.buffer_size)
            .field("auto_offset_reset", &self.auto_offset_reset)
            .finish_non_exhaustive()
    }
}

impl RedpandaEventBus {
    /// Create an event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    fn group_for(&self, topics: &[String]) -> String {
        self.consumer_group.clone().unwrap_or_else(|| {
            let mut sorted = topics.to_vec();
            sorted.sort();
            format!("kitchen-board-{}", sorted.join("-"))
        })
    }

    fn live_consumer(
        &self,
        topics: &[String],
        group_id: &str,
    ) -> Result<(LiveConsumer, watch::Receiver<bool>), EventBusError> {
        let failed = |reason: String| EventBusError::SubscriptionFailed {
            topics: topics.to_vec(),
            reason,
        };

        let (assigned, assignment) = watch::channel(false);
        let consumer: LiveConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .create_with_context(AssignmentContext { assigned })
            .map_err(|e| failed(format!("Failed to create consumer: {e}")))?;

        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&names)
            .map_err(|e| failed(format!("Failed to subscribe: {e}")))?;
        Ok((consumer, assignment))
    }
}

/// Builder for configuring a [`RedpandaEventBus`].
#[derive(Default, Debug)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
    assignment_timeout: Option<Duration>,
}

impl RedpandaEventBusBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: `"0"`, `"1"` or `"all"`.
    ///
    /// Default: `"1"`
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: `"none"`, `"gzip"`, `"snappy"`, `"lz4"`, `"zstd"`.
    ///
    /// Default: `"none"`
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group ID for subscriptions.
    ///
    /// If not set, the group is derived from the subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set how many payloads may wait between the consumer and the subscriber.
    ///
    /// Default: 1000. Zero is treated as one.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Set where a new consumer group starts reading: `"earliest"`, `"latest"` or `"error"`.
    ///
    /// Default: `"latest"`. Replay covers history, so live subscriptions only
    /// need new messages.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set how long `subscribe` waits for the group to assign partitions.
    ///
    /// Default: 10 seconds. On timeout the subscription is returned anyway and
    /// a warning is logged.
    #[must_use]
    pub const fn assignment_timeout(mut self, timeout: Duration) -> Self {
        self.assignment_timeout = Some(timeout);
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set or the
    /// producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self.brokers.ok_or_else(|| {
            EventBusError::ConnectionFailed("Brokers not configured".to_string())
        })?;

        let acks = self.producer_acks.as_deref().unwrap_or("1");
        let compression = self.compression.as_deref().unwrap_or("none");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", acks)
            .set("compression.type", compression)
            .create()
            .map_err(|e| {
                EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
            })?;

        let buffer_size = self.buffer_size.unwrap_or(1000);
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "latest".to_string());

        tracing::info!(
            brokers = %brokers,
            acks,
            compression,
            buffer_size,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset,
            assignment_timeout: self.assignment_timeout.unwrap_or(Duration::from_secs(10)),
        })
    }
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let payload = payload.to_vec();
        let timeout = self.timeout;

        Box::pin(async move {
            let key = partition_key(&payload);
            let mut record = FutureRecord::<str, [u8]>::to(&topic).payload(payload.as_slice());
            if let Some(key) = key.as_deref() {
                record = record.key(key);
            }

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        key = key.as_deref().unwrap_or(""),
                        "Event published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(topic = %topic, error = %kafka_error, "Failed to publish event");
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            let group_id = self.group_for(&topics);
            let (consumer, assignment) = self.live_consumer(&topics, &group_id)?;

            // The group join happens on the consumer's first poll, so the
            // forwarding task must already be running while we wait.
            let (tx, mut rx) = mpsc::channel(self.buffer_size);
            tokio::spawn(forward_messages(consumer, tx));
            let positioned = wait_for_assignment(assignment, self.assignment_timeout).await;

            tracing::info!(
                topics = ?topics,
                group_id = %group_id,
                auto_offset_reset = %self.auto_offset_reset,
                positioned,
                "Subscribed to ticket topics"
            );

            let stream = async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}

/// Wait until partitions are assigned. Returns `false` on timeout or if the
/// consumer went away first.
async fn wait_for_assignment(mut assignment: watch::Receiver<bool>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, assignment.wait_for(|assigned| *assigned)).await {
        Ok(Ok(_)) => true,
        Ok(Err(_)) => {
            tracing::warn!("Consumer closed before partitions were assigned");
            false
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "No partition assignment yet, messages before the assignment may be missed"
            );
            false
        }
    }
}

fn payload_of(message: &BorrowedMessage<'_>) -> Result<Vec<u8>, EventBusError> {
    message.payload().map(<[u8]>::to_vec).ok_or_else(|| {
        EventBusError::InvalidMessage(format!(
            "{}/{}@{} has no payload",
            message.topic(),
            message.partition(),
            message.offset()
        ))
    })
}

/// Owns the consumer until the subscriber's stream is dropped.
///
/// An offset is committed only once its payload is in the channel, so a crash
/// in between means redelivery rather than loss.
async fn forward_messages(
    consumer: LiveConsumer,
    tx: mpsc::Sender<Result<Vec<u8>, EventBusError>>,
) {
    let mut messages = consumer.stream();

    while let Some(received) = messages.next().await {
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                let error = EventBusError::TransportError(format!("Failed to receive message: {e}"));
                if tx.send(Err(error)).await.is_err() {
                    break;
                }
                continue;
            }
        };

        tracing::trace!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "Received ticket message"
        );

        if tx.send(payload_of(&message)).await.is_err() {
            tracing::debug!("Subscriber stream dropped, closing consumer");
            break;
        }

        if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
            tracing::warn!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Offset commit failed, message may be redelivered"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rdkafka::TopicPartitionList;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let err = RedpandaEventBus::builder().build().unwrap_err();
        assert!(matches!(err, EventBusError::ConnectionFailed(_)));
    }

    #[test]
    fn zero_buffer_is_clamped() {
        let builder = RedpandaEventBus::builder().buffer_size(0);
        assert_eq!(builder.buffer_size, Some(1));
    }

    #[test]
    fn assignment_is_signalled_after_rebalance() {
        let (assigned, assignment) = watch::channel(false);
        let context = AssignmentContext { assigned };

        context.post_rebalance(&Rebalance::Revoke(&TopicPartitionList::new()));
        assert!(!*assignment.borrow());

        context.post_rebalance(&Rebalance::Assign(&TopicPartitionList::new()));
        assert!(*assignment.borrow());
    }

    #[tokio::test]
    async fn waiting_for_assignment_gives_up_after_timeout() {
        let (_assigned, assignment) = watch::channel(false);
        assert!(!wait_for_assignment(assignment, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn waiting_for_assignment_returns_once_assigned() {
        let (assigned, assignment) = watch::channel(false);
        assigned.send_replace(true);
        assert!(wait_for_assignment(assignment, Duration::from_secs(10)).await);
    }

    #[test]
    fn partition_key_reads_ticket_id() {
        assert_eq!(
            partition_key(br#"{"event_type":"kitchen.ticket.created","ticket_id":"t-9","station":"bar"}"#),
            Some("t-9".to_string())
        );
        assert_eq!(partition_key(br#"{"event_type":"kitchen.ticket.created"}"#), None);
        assert_eq!(partition_key(br#"{"ticket_id":""}"#), None);
        assert_eq!(partition_key(b"[1,2,3]"), None);
    }
}
