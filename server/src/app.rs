//! Application wiring.
//!
//! [`KitchenBoardApp`] owns the cache and its live subscriber. Collaborators are
//! built from [`Config`]; [`KitchenBoardApp::with_collaborators`] accepts any
//! implementation of the core traits.

use crate::config::Config;
use kitchen_board_core::event_bus::{EventBus, EventBusError};
use kitchen_board_core::event_log::{EventLog, EventLogError};
use kitchen_board_core::ticket_source::TicketSource;
use kitchen_board_http::{HttpSourceError, HttpTicketSource};
use kitchen_board_projections::{
    BootstrapError, LiveSubscriber, SubscriberError, TicketStateCache, WarmConfig, WarmReport,
};
use kitchen_board_redpanda::{RedpandaEventBus, RedpandaEventLog};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors raised while wiring or starting the service.
#[derive(Error, Debug)]
pub enum AppError {
    /// Live event bus could not be created
    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    /// Replay log could not be created
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// Fallback ticket source could not be created
    #[error("Ticket source error: {0}")]
    TicketSource(#[from] HttpSourceError),

    /// Live updates could not be started
    #[error("Live updates unavailable: {0}")]
    Subscribe(#[from] SubscriberError),

    /// Prometheus exporter could not be installed
    #[error("Metrics exporter error: {0}")]
    Metrics(String),
}

/// Install the Prometheus exporter and describe the cache metrics.
///
/// # Errors
///
/// Returns [`AppError::Metrics`] if the listener cannot be bound or a recorder is
/// already installed.
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<(), AppError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Metrics(e.to_string()))?;

    kitchen_board_projections::metrics::describe_metrics();
    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// The running read model.
pub struct KitchenBoardApp {
    cache: Arc<TicketStateCache>,
    subscriber: LiveSubscriber,
    pump: Option<JoinHandle<()>>,
}

impl KitchenBoardApp {
    /// Build the application from configuration.
    ///
    /// No connection is made until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if a configured collaborator cannot be created.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let (event_bus, event_log) = match &config.redpanda.brokers {
            Some(brokers) => {
                let bus: Arc<dyn EventBus> = Arc::new(
                    RedpandaEventBus::builder()
                        .brokers(brokers.as_str())
                        .consumer_group(config.redpanda.consumer_group.as_str())
                        .build()?,
                );
                let log: Arc<dyn EventLog> = Arc::new(
                    RedpandaEventLog::builder()
                        .brokers(brokers.as_str())
                        .topic(config.redpanda.topic.as_str())
                        .idle_timeout(Duration::from_millis(config.replay.idle_ms))
                        .build()?,
                );
                (Some(bus), Some(log))
            }
            None => {
                tracing::warn!("REDPANDA_BROKERS not set; replay and live updates disabled");
                (None, None)
            }
        };

        let ticket_source = match &config.fallback.service_url {
            Some(url) => {
                let mut builder = HttpTicketSource::builder()
                    .base_url(url.as_str())
                    .tickets_path(config.fallback.tickets_path.as_str())
                    .timeout(Duration::from_secs(config.fallback.timeout_secs));
                if let Some(token) = &config.fallback.token {
                    builder = builder.bearer_token(token.as_str());
                }
                let source: Arc<dyn TicketSource> = Arc::new(builder.build()?);
                Some(source)
            }
            None => None,
        };

        Ok(Self::with_collaborators(
            config.warm_config(),
            &config.redpanda.topic,
            event_bus,
            event_log,
            ticket_source,
        ))
    }

    /// Build the application from already constructed collaborators.
    #[must_use]
    pub fn with_collaborators(
        warm_config: WarmConfig,
        topic: &str,
        event_bus: Option<Arc<dyn EventBus>>,
        event_log: Option<Arc<dyn EventLog>>,
        ticket_source: Option<Arc<dyn TicketSource>>,
    ) -> Self {
        let mut cache = TicketStateCache::new().with_warm_config(warm_config);
        if let Some(log) = event_log {
            cache = cache.with_event_log(log);
        }
        if let Some(source) = ticket_source {
            cache = cache.with_ticket_source(source);
        }
        let cache = Arc::new(cache);
        let subscriber = LiveSubscriber::new(Arc::clone(&cache), event_bus).with_topic(topic);

        Self {
            cache,
            subscriber,
            pump: None,
        }
    }

    /// The shared read model.
    #[must_use]
    pub const fn cache(&self) -> &Arc<TicketStateCache> {
        &self.cache
    }

    /// Whether live updates are being applied.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.pump.is_some()
    }

    /// Warm the cache and start live updates.
    ///
    /// A failed warm-up does not stop the service: the error is logged and live
    /// updates start on the empty cache from the subscription made before
    /// warming, so nothing published during warm-up is skipped. The returned
    /// report is `None` in that case.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Subscribe`] if the live topic cannot be subscribed.
    pub async fn start(&mut self) -> Result<Option<WarmReport>, AppError> {
        match self.subscriber.bootstrap().await {
            Ok(started) => {
                self.pump = started.handle;
                Ok(Some(started.report))
            }
            Err(BootstrapError::Warm { source, subscription }) => {
                tracing::error!(error = %source, "Cache warm-up failed, starting degraded with live updates only");
                self.pump = match subscription {
                    Some(subscription) => Some(subscription.spawn()),
                    // No bus, or subscribing failed before warm-up; try once more.
                    None => self.subscriber.start().await?,
                };
                Ok(None)
            }
            Err(BootstrapError::Subscribe { source, .. }) => Err(AppError::Subscribe(source)),
        }
    }

    /// Stop live updates and wait for the pump to finish.
    pub async fn shutdown(mut self) {
        self.subscriber.stop();
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                tracing::error!(error = %e, "Live subscription task failed");
            }
        }
        tracing::info!(tickets = self.cache.len(), "Kitchen board stopped");
    }
}
