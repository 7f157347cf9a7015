//! Fallback listing of active tickets.
//!
//! When replay is unavailable the read model imports the kitchen service's
//! current view instead. The listing is expected to contain only active tickets,
//! shaped like the "ticket created" snapshot.

use crate::ticket::TicketSnapshot;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from a [`TicketSource`].
#[derive(Error, Debug, Clone)]
pub enum TicketSourceError {
    /// The request could not be sent or did not complete.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a non-success status.
    #[error("Kitchen service error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The response body was not a ticket listing.
    #[error("Response parsing failed: {0}")]
    InvalidResponse(String),
}

/// Lists every currently active ticket.
pub trait TicketSource: Send + Sync {
    /// Fetch the active ticket listing.
    ///
    /// # Errors
    ///
    /// Returns [`TicketSourceError`] if the listing cannot be retrieved or parsed.
    fn list_active_tickets(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TicketSnapshot>, TicketSourceError>> + Send + '_>>;
}
