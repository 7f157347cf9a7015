//! Configuration management for the kitchen-board service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparseable numeric values fall back to their default.

use kitchen_board_http::DEFAULT_TICKETS_PATH;
use kitchen_board_projections::{DEFAULT_TOPIC, WarmConfig};
use kitchen_board_projections::warm::DEFAULT_REPLAY_MAX_MESSAGES;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Redpanda/Kafka configuration
    pub redpanda: RedpandaConfig,
    /// Warm-up replay configuration
    pub replay: ReplayConfig,
    /// HTTP fallback configuration
    pub fallback: FallbackConfig,
    /// Metrics exporter configuration
    pub metrics: MetricsConfig,
}

/// Redpanda/Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated). Unset disables replay and live updates.
    pub brokers: Option<String>,
    /// Topic carrying kitchen ticket events
    pub topic: String,
    /// Consumer group for the live subscription
    pub consumer_group: String,
}

/// Warm-up replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Upper bound on messages read during replay
    pub max_messages: usize,
    /// Overall replay timeout in seconds
    pub timeout_secs: u64,
    /// Replay stops after this many milliseconds without a message
    pub idle_ms: u64,
}

/// HTTP fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Kitchen service base URL. Unset disables the fallback.
    pub service_url: Option<String>,
    /// Path and query of the active-ticket listing
    pub tickets_path: String,
    /// Bearer token for the kitchen service
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Listing timeout in seconds
    pub timeout_secs: u64,
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address the Prometheus scrape endpoint listens on
    pub addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let number = |key: &str, default| parse_or(text(key), default);

        Self {
            redpanda: RedpandaConfig {
                brokers: text("REDPANDA_BROKERS"),
                topic: text("KITCHEN_TICKETS_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
                consumer_group: text("KITCHEN_CONSUMER_GROUP")
                    .unwrap_or_else(|| "kitchen-board-cache".to_string()),
            },
            replay: ReplayConfig {
                max_messages: parse_or(text("KITCHEN_REPLAY_MAX_MESSAGES"), DEFAULT_REPLAY_MAX_MESSAGES),
                timeout_secs: number("KITCHEN_REPLAY_TIMEOUT_SECS", 30),
                idle_ms: number("KITCHEN_REPLAY_IDLE_MS", 2000),
            },
            fallback: FallbackConfig {
                service_url: text("KITCHEN_SERVICE_URL"),
                tickets_path: text("KITCHEN_TICKETS_PATH")
                    .unwrap_or_else(|| DEFAULT_TICKETS_PATH.to_string()),
                token: text("KITCHEN_SERVICE_TOKEN"),
                timeout_secs: number("KITCHEN_FALLBACK_TIMEOUT_SECS", 10),
            },
            metrics: MetricsConfig {
                addr: parse_or(text("METRICS_ADDR"), SocketAddr::from(([0, 0, 0, 0], 9090))),
            },
        }
    }

    /// Timeouts and page size for [`TicketStateCache::warm`](kitchen_board_projections::TicketStateCache::warm).
    #[must_use]
    pub const fn warm_config(&self) -> WarmConfig {
        WarmConfig {
            replay_max_messages: self.replay.max_messages,
            replay_timeout: Duration::from_secs(self.replay.timeout_secs),
            fallback_timeout: Duration::from_secs(self.fallback.timeout_secs),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]);

        assert!(config.redpanda.brokers.is_none());
        assert_eq!(config.redpanda.topic, "kitchen-ticket-events");
        assert_eq!(config.redpanda.consumer_group, "kitchen-board-cache");
        assert_eq!(config.replay.max_messages, 10_000);
        assert_eq!(config.replay.timeout_secs, 30);
        assert_eq!(config.replay.idle_ms, 2000);
        assert!(config.fallback.service_url.is_none());
        assert_eq!(config.fallback.tickets_path, "/api/v1/kitchen/tickets?active=true");
        assert!(config.fallback.token.is_none());
        assert_eq!(config.fallback.timeout_secs, 10);
        assert_eq!(config.metrics.addr, SocketAddr::from(([0, 0, 0, 0], 9090)));
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("REDPANDA_BROKERS", "redpanda-0:9092,redpanda-1:9092"),
            ("KITCHEN_TICKETS_TOPIC", "kitchen-staging"),
            ("KITCHEN_CONSUMER_GROUP", "board-2"),
            ("KITCHEN_REPLAY_MAX_MESSAGES", "500"),
            ("KITCHEN_REPLAY_TIMEOUT_SECS", "5"),
            ("KITCHEN_REPLAY_IDLE_MS", "250"),
            ("KITCHEN_SERVICE_URL", "http://kitchen:8080"),
            ("KITCHEN_TICKETS_PATH", "/tickets"),
            ("KITCHEN_SERVICE_TOKEN", "secret"),
            ("KITCHEN_FALLBACK_TIMEOUT_SECS", "3"),
            ("METRICS_ADDR", "127.0.0.1:9100"),
        ]);

        assert_eq!(config.redpanda.brokers.as_deref(), Some("redpanda-0:9092,redpanda-1:9092"));
        assert_eq!(config.redpanda.topic, "kitchen-staging");
        assert_eq!(config.redpanda.consumer_group, "board-2");
        assert_eq!(config.replay.max_messages, 500);
        assert_eq!(config.replay.idle_ms, 250);
        assert_eq!(config.fallback.service_url.as_deref(), Some("http://kitchen:8080"));
        assert_eq!(config.fallback.tickets_path, "/tickets");
        assert_eq!(config.fallback.token.as_deref(), Some("secret"));
        assert_eq!(config.metrics.addr.port(), 9100);

        let warm = config.warm_config();
        assert_eq!(warm.replay_max_messages, 500);
        assert_eq!(warm.replay_timeout, Duration::from_secs(5));
        assert_eq!(warm.fallback_timeout, Duration::from_secs(3));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config(&[
            ("KITCHEN_REPLAY_MAX_MESSAGES", "lots"),
            ("KITCHEN_REPLAY_TIMEOUT_SECS", "-1"),
            ("METRICS_ADDR", "nowhere"),
        ]);

        assert_eq!(config.replay.max_messages, 10_000);
        assert_eq!(config.replay.timeout_secs, 30);
        assert_eq!(config.metrics.addr.port(), 9090);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config(&[("REDPANDA_BROKERS", "  "), ("KITCHEN_SERVICE_URL", "")]);

        assert!(config.redpanda.brokers.is_none());
        assert!(config.fallback.service_url.is_none());
    }
}
