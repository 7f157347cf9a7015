//! `reqwest` client for the active-ticket listing.

use crate::error::HttpSourceError;
use kitchen_board_core::ticket::TicketSnapshot;
use kitchen_board_core::ticket_source::{TicketSource, TicketSourceError};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Listing path appended to the base URL unless overridden.
pub const DEFAULT_TICKETS_PATH: &str = "/api/v1/kitchen/tickets?active=true";

/// The service answers with either a bare array or `{"tickets": [...]}`.
///
/// The shape is picked first so a bad entry reports serde's own reason.
fn decode_listing(body: &[u8]) -> Result<Vec<TicketSnapshot>, HttpSourceError> {
    let invalid = |e: serde_json::Error| HttpSourceError::InvalidResponse(e.to_string());

    match serde_json::from_slice::<Value>(body).map_err(invalid)? {
        listing @ Value::Array(_) => serde_json::from_value(listing).map_err(invalid),
        Value::Object(mut fields) => match fields.remove("tickets") {
            Some(tickets) => serde_json::from_value(tickets).map_err(invalid),
            None => Err(HttpSourceError::InvalidResponse(
                "expected an object with a `tickets` field".to_string(),
            )),
        },
        other => Err(HttpSourceError::InvalidResponse(format!(
            "expected a ticket array or object, got {other}"
        ))),
    }
}

/// Fetches the kitchen service's view of active tickets.
#[derive(Clone, Debug)]
pub struct HttpTicketSource {
    client: Client,
    url: Url,
    bearer_token: Option<String>,
}

impl HttpTicketSource {
    /// Create a source for `base_url` with the default path and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HttpSourceError::InvalidUrl`] if the URL does not parse.
    pub fn new(base_url: impl Into<String>) -> Result<Self, HttpSourceError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> HttpTicketSourceBuilder {
        HttpTicketSourceBuilder::default()
    }

    /// Full listing URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Call the listing endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`HttpSourceError`] for transport failures, non-success statuses
    /// or a body that is not a ticket listing.
    pub async fn fetch_active(&self) -> Result<Vec<TicketSnapshot>, HttpSourceError> {
        tracing::debug!(url = %self.url, "Requesting active ticket listing");

        let mut request = self.client.get(self.url.clone());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HttpSourceError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| HttpSourceError::RequestFailed(e.to_string()))?;
                let tickets = decode_listing(&body)?;

                tracing::debug!(tickets = tickets.len(), bytes = body.len(), "Received ticket listing");
                Ok(tickets)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HttpSourceError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(HttpSourceError::Status {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }
}

impl TicketSource for HttpTicketSource {
    fn list_active_tickets(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TicketSnapshot>, TicketSourceError>> + Send + '_>> {
        Box::pin(async move { self.fetch_active().await.map_err(TicketSourceError::from) })
    }
}

/// Builder for [`HttpTicketSource`].
#[derive(Debug, Default)]
pub struct HttpTicketSourceBuilder {
    base_url: Option<String>,
    tickets_path: Option<String>,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTicketSourceBuilder {
    /// Kitchen service root, e.g. `http://kitchen-service:8080`.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Path and query of the listing endpoint.
    ///
    /// Default: [`DEFAULT_TICKETS_PATH`]
    #[must_use]
    pub fn tickets_path(mut self, path: impl Into<String>) -> Self {
        self.tickets_path = Some(path.into());
        self
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Per-request timeout.
    ///
    /// Default: 10 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`HttpTicketSource`].
    ///
    /// # Errors
    ///
    /// Returns [`HttpSourceError::MissingBaseUrl`] without a base URL,
    /// [`HttpSourceError::InvalidUrl`] if the assembled URL does not parse, or
    /// [`HttpSourceError::ClientBuild`] if the client cannot be created.
    pub fn build(self) -> Result<HttpTicketSource, HttpSourceError> {
        let base_url = self.base_url.ok_or(HttpSourceError::MissingBaseUrl)?;
        let path = self
            .tickets_path
            .unwrap_or_else(|| DEFAULT_TICKETS_PATH.to_string());

        let raw = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let url = Url::parse(&raw).map_err(|e| HttpSourceError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .build()
            .map_err(|e| HttpSourceError::ClientBuild(e.to_string()))?;

        Ok(HttpTicketSource {
            client,
            url,
            bearer_token: self.bearer_token.filter(|token| !token.is_empty()),
        })
    }
}
