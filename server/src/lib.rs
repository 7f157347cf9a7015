//! # kitchen-board server
//!
//! Runs the kitchen ticket read model as a service: loads [`Config`] from the
//! environment, wires Redpanda and the kitchen service into a
//! [`TicketStateCache`](kitchen_board_projections::TicketStateCache), warms it,
//! keeps it current from the live topic and exports metrics for Prometheus.

pub mod app;
pub mod config;

pub use app::{AppError, KitchenBoardApp, install_metrics_exporter};
pub use config::Config;
