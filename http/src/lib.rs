//! HTTP ticket listing for kitchen-board.
//!
//! [`HttpTicketSource`] implements
//! [`TicketSource`](kitchen_board_core::ticket_source::TicketSource) against the
//! kitchen service's "list active tickets" endpoint. The read model only calls
//! it when event replay is unavailable.
//!
//! # Example
//!
//! ```no_run
//! use kitchen_board_http::HttpTicketSource;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), kitchen_board_http::HttpSourceError> {
//! let source = HttpTicketSource::builder()
//!     .base_url("http://kitchen-service:8080")
//!     .bearer_token("service-token")
//!     .timeout(Duration::from_secs(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{DEFAULT_TICKETS_PATH, HttpTicketSource, HttpTicketSourceBuilder};
pub use error::HttpSourceError;
