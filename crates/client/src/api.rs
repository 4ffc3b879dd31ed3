//! REST client for the Retriage backend.
//!
//! One method per resource operation, using [`reqwest`]. A `404` from
//! `GET /api/events/active` is the normal "nothing running" answer and
//! comes back as `Ok(None)`; every other non-2xx status is an error.

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::StatusCode;
use retriage_core::{DbId, Event, EventTemplate, PatientPool, PoolTemplate, User};
use serde::Deserialize;

const EVENTS: &str = "/api/events";
const POOLS: &str = "/api/pools";
const POOL_TEMPLATES: &str = "/api/pools/templates";
const USERS_ME: &str = "/api/users/me";

/// Response body of a successful `POST /api/events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCreated {
    pub message: String,
    pub event_id: Option<DbId>,
}

/// HTTP client for one backend origin.
pub struct RetriageApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The session cookie is missing or no longer valid.
    #[error("Not signed in: the session token is invalid or missing")]
    Unauthenticated,

    /// Signed in, but the role may not perform this call.
    #[error("Not permitted: {body}")]
    Unauthorized { body: String },

    /// Any other non-2xx status.
    #[error("Retriage API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ApiError {
    /// True for failures worth retrying later (network trouble, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Unauthenticated | ApiError::Unauthorized { .. } => false,
        }
    }
}

impl RetriageApi {
    /// Create a client for `api_url`, e.g. `http://host:8080`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create a client that forwards a session cookie on every request.
    pub fn with_session_cookie(api_url: String, cookie: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.insert(COOKIE, value);
        } else {
            tracing::warn!("Session cookie contains invalid header characters, ignoring it");
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self { client, api_url })
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Origin every request path is appended to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- events ----

    /// Every event the backend knows, in any run state.
    pub async fn list_events(&self) -> Result<Vec<Event>, ApiError> {
        let response = self.client.get(self.url(EVENTS)).send().await?;
        Self::parse_response(response).await
    }

    /// One event by id, with its pools and patients.
    pub async fn get_event(&self, id: DbId) -> Result<Event, ApiError> {
        let response = self
            .client
            .get(format!("{}/{id}", self.url(EVENTS)))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Create an event from a name, duration and selected pool templates.
    ///
    /// The backend answers with the new id rather than the full event.
    pub async fn create_event(&self, form: &EventTemplate) -> Result<EventCreated, ApiError> {
        let response = self.client.post(self.url(EVENTS)).json(form).send().await?;
        Self::parse_response(response).await
    }

    /// Delete an event by id.
    pub async fn delete_event(&self, id: DbId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/{id}", self.url(EVENTS)))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// The currently running event, or `None` when nothing is running.
    pub async fn active_event(&self) -> Result<Option<Event>, ApiError> {
        let response = self
            .client
            .get(format!("{}/active", self.url(EVENTS)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("No active event");
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    // ---- pools ----

    /// All pools across events.
    pub async fn list_pools(&self) -> Result<Vec<PatientPool>, ApiError> {
        let response = self.client.get(self.url(POOLS)).send().await?;
        Self::parse_response(response).await
    }

    /// One pool by id, with its patients.
    pub async fn get_pool(&self, id: DbId) -> Result<PatientPool, ApiError> {
        let response = self
            .client
            .get(format!("{}/{id}", self.url(POOLS)))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Delete a pool by id.
    pub async fn delete_pool(&self, id: DbId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/{id}", self.url(POOLS)))
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- pool templates ----

    /// The pool templates offered when creating an event.
    pub async fn list_pool_templates(&self) -> Result<Vec<PoolTemplate>, ApiError> {
        let response = self.client.get(self.url(POOL_TEMPLATES)).send().await?;
        Self::parse_response(response).await
    }

    /// Store a new pool template. The answer carries the assigned id.
    pub async fn create_pool_template(
        &self,
        template: &PoolTemplate,
    ) -> Result<PoolTemplate, ApiError> {
        let response = self
            .client
            .post(self.url(POOL_TEMPLATES))
            .json(template)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Delete a pool template by id.
    pub async fn delete_pool_template(&self, id: DbId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/{id}", self.url(POOL_TEMPLATES)))
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- users ----

    /// Resolve the signed-in user from the session cookie.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let response = self.client.get(self.url(USERS_ME)).send().await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Map a non-2xx response to the matching [`ApiError`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::debug!(status = status.as_u16(), body = %body, "Retriage API call failed");
        Err(error_for_status(status, body))
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Classify a failed status code.
pub(crate) fn error_for_status(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthenticated,
        StatusCode::FORBIDDEN => ApiError::Unauthorized { body },
        _ => ApiError::Status {
            status: status.as_u16(),
            body,
        },
    }
}
