//! Error types for the HTTP ticket source

use kitchen_board_core::ticket_source::TicketSourceError;
use thiserror::Error;

/// Errors raised while building or calling the listing endpoint.
#[derive(Debug, Error)]
pub enum HttpSourceError {
    /// No base URL was configured
    #[error("Kitchen service base URL not configured")]
    MissingBaseUrl,

    /// Base URL and path do not form a valid URL
    #[error("Invalid listing URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as assembled
        url: String,
        /// Parser message
        reason: String,
    },

    /// The underlying HTTP client could not be created
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Unauthorized - missing or rejected service token
    #[error("Unauthorized - kitchen service rejected the token")]
    Unauthorized,

    /// Service returned an error
    #[error("Kitchen service error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    InvalidResponse(String),
}

impl From<HttpSourceError> for TicketSourceError {
    fn from(error: HttpSourceError) -> Self {
        match error {
            HttpSourceError::Unauthorized => Self::Status {
                status: 401,
                message: error.to_string(),
            },
            HttpSourceError::Status { status, message } => Self::Status { status, message },
            HttpSourceError::InvalidResponse(reason) => Self::InvalidResponse(reason),
            HttpSourceError::MissingBaseUrl
            | HttpSourceError::InvalidUrl { .. }
            | HttpSourceError::ClientBuild(_)
            | HttpSourceError::RequestFailed(_) => Self::RequestFailed(error.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_their_code() {
        let converted: TicketSourceError = HttpSourceError::Status {
            status: 503,
            message: "maintenance".to_string(),
        }
        .into();

        assert!(matches!(
            converted,
            TicketSourceError::Status { status: 503, ref message } if message == "maintenance"
        ));
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let converted: TicketSourceError = HttpSourceError::Unauthorized.into();
        assert!(matches!(converted, TicketSourceError::Status { status: 401, .. }));
    }

    #[test]
    fn transport_errors_map_to_request_failed() {
        let converted: TicketSourceError =
            HttpSourceError::RequestFailed("connection refused".to_string()).into();
        match converted {
            TicketSourceError::RequestFailed(reason) => assert!(reason.contains("connection refused")),
            other => panic!("unexpected conversion: {other}"),
        }
    }
}
