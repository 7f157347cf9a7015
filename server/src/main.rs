//! Kitchen board server
//!
//! Keeps the kitchen ticket read model warm and current.
//!
//! # Usage
//!
//! ```bash
//! REDPANDA_BROKERS=localhost:9092 \
//! KITCHEN_SERVICE_URL=http://localhost:8080 \
//! cargo run -p kitchen-board-server --bin kitchen-board
//! ```

use kitchen_board_server::{Config, KitchenBoardApp, install_metrics_exporter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kitchen_board=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        brokers = config.redpanda.brokers.as_deref().unwrap_or("<none>"),
        topic = %config.redpanda.topic,
        fallback = config.fallback.service_url.as_deref().unwrap_or("<none>"),
        "Configuration loaded"
    );

    install_metrics_exporter(config.metrics.addr)?;

    let mut app = KitchenBoardApp::new(&config)?;
    if let Some(report) = app.start().await? {
        tracing::info!(
            source = %report.source,
            tickets = report.tickets,
            live = app.is_live(),
            "Kitchen board ready"
        );
    }

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down gracefully...");
    app.shutdown().await;
    Ok(())
}
