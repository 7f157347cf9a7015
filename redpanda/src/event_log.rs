//! Bounded replay of a ticket topic from its earliest retained offset.
//!
//! Every fetch creates a short-lived consumer, assigns all partitions of the
//! topic at their beginning and reads until one of:
//!
//! - `max_messages` payloads were collected
//! - every partition reported end-of-partition
//! - no message arrived within the idle timeout
//!
//! Nothing is committed; replay never moves the live consumer group.
//!
//! The read runs on a blocking thread. Dropping the fetch future abandons its
//! result; the read itself still ends by one of the conditions above.

use kitchen_board_core::event_log::{EventLog, EventLogError};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Replays a topic's retained history for cache warm-up.
///
/// # Example
///
/// ```no_run
/// use kitchen_board_redpanda::RedpandaEventLog;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let log = RedpandaEventLog::builder()
///     .brokers("localhost:9092")
///     .topic("kitchen-ticket-events")
///     .idle_timeout(Duration::from_secs(2))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RedpandaEventLog {
    brokers: String,
    topic: String,
    group_id: String,
    idle_timeout: Duration,
    metadata_timeout: Duration,
}

impl RedpandaEventLog {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> RedpandaEventLogBuilder {
        RedpandaEventLogBuilder::default()
    }

    /// Topic being replayed.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn consumer(&self) -> Result<BaseConsumer, EventLogError> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "true")
            .create()
            .map_err(|e| EventLogError::ConnectionFailed(format!("Failed to create consumer: {e}")))
    }

    fn read_history(&self, max_messages: usize) -> Result<Vec<Vec<u8>>, EventLogError> {
        let consumer = self.consumer()?;

        let metadata = consumer
            .fetch_metadata(Some(self.topic.as_str()), self.metadata_timeout)
            .map_err(|e| EventLogError::ConnectionFailed(format!("Failed to fetch metadata: {e}")))?;

        let partitions: Vec<i32> = metadata
            .topics()
            .iter()
            .filter(|t| t.name() == self.topic && t.error().is_none())
            .flat_map(|t| t.partitions().iter().map(|p| p.id()))
            .collect();

        if partitions.is_empty() {
            return Err(EventLogError::NotFound(self.topic.clone()));
        }

        let mut assignment = TopicPartitionList::new();
        for partition in &partitions {
            assignment
                .add_partition_offset(&self.topic, *partition, Offset::Beginning)
                .map_err(|e| EventLogError::FetchFailed(e.to_string()))?;
        }
        consumer
            .assign(&assignment)
            .map_err(|e| EventLogError::FetchFailed(format!("Failed to assign partitions: {e}")))?;

        let mut payloads = Vec::new();
        let mut finished: HashSet<i32> = HashSet::new();

        while payloads.len() < max_messages && finished.len() < partitions.len() {
            match consumer.poll(self.idle_timeout) {
                None => {
                    tracing::debug!(
                        topic = %self.topic,
                        idle_ms = u64::try_from(self.idle_timeout.as_millis()).unwrap_or(u64::MAX),
                        "Replay idle, stopping"
                    );
                    break;
                }
                Some(Ok(message)) => match message.payload() {
                    Some(payload) => payloads.push(payload.to_vec()),
                    None => tracing::warn!(
                        partition = message.partition(),
                        offset = message.offset(),
                        "Skipping message without payload"
                    ),
                },
                Some(Err(KafkaError::PartitionEOF(partition))) => {
                    finished.insert(partition);
                }
                Some(Err(e)) => {
                    return Err(EventLogError::FetchFailed(format!("Failed to read message: {e}")));
                }
            }
        }

        tracing::info!(
            topic = %self.topic,
            partitions = partitions.len(),
            messages = payloads.len(),
            "Read ticket event history"
        );
        Ok(payloads)
    }
}

impl EventLog for RedpandaEventLog {
    fn fetch(
        &self,
        max_messages: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<u8>>, EventLogError>> + Send + '_>> {
        let log = self.clone();
        Box::pin(async move {
            // librdkafka's polling API blocks; keep it off the async workers.
            tokio::task::spawn_blocking(move || log.read_history(max_messages))
                .await
                .map_err(|e| EventLogError::FetchFailed(format!("Replay task failed: {e}")))?
        })
    }
}

/// Builder for [`RedpandaEventLog`].
#[derive(Debug, Default)]
pub struct RedpandaEventLogBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    group_id: Option<String>,
    idle_timeout: Option<Duration>,
    metadata_timeout: Option<Duration>,
}

impl RedpandaEventLogBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic to replay.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the consumer group id used while replaying. Nothing is committed under it.
    ///
    /// Default: `kitchen-board-replay`
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Stop reading after this long without a message.
    ///
    /// Default: 2 seconds
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Bound the topic metadata lookup.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = Some(timeout);
        self
    }

    /// Build the [`RedpandaEventLog`].
    ///
    /// No connection is made until the first fetch.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::ConnectionFailed`] if brokers or topic are missing.
    pub fn build(self) -> Result<RedpandaEventLog, EventLogError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventLogError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self
            .topic
            .ok_or_else(|| EventLogError::ConnectionFailed("Topic not configured".to_string()))?;

        Ok(RedpandaEventLog {
            brokers,
            topic,
            group_id: self
                .group_id
                .unwrap_or_else(|| "kitchen-board-replay".to_string()),
            idle_timeout: self.idle_timeout.unwrap_or(Duration::from_secs(2)),
            metadata_timeout: self.metadata_timeout.unwrap_or(Duration::from_secs(5)),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_brokers_and_topic() {
        assert!(matches!(
            RedpandaEventLog::builder().topic("t").build(),
            Err(EventLogError::ConnectionFailed(_))
        ));
        assert!(matches!(
            RedpandaEventLog::builder().brokers("localhost:9092").build(),
            Err(EventLogError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn builder_defaults() {
        let log = RedpandaEventLog::builder()
            .brokers("localhost:9092")
            .topic("kitchen-ticket-events")
            .build()
            .unwrap();

        assert_eq!(log.topic(), "kitchen-ticket-events");
        assert_eq!(log.group_id, "kitchen-board-replay");
        assert_eq!(log.idle_timeout, Duration::from_secs(2));
    }
}
