//! HTTP client for the rota API.
//!
//! Read endpoints take a `start_date`/`end_date` query and answer with a JSON
//! array of records. Records are decoded one at a time: a malformed record is
//! logged and skipped so the rest of the batch still lands.

use std::fmt;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode, Url};
use rota_core::{
    CallRecord, DateRange, EntityKind, Event, EventId, PersonPresence, Shift, Timesheet,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const REMOVE_EVENT_PATH: &str = "rota/remove-event";
const MAX_ERROR_BODY: usize = 200;

/// Rota API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL cannot be used.
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(err) if err.is_timeout())
    }
}

/// Rota API client.
///
/// # Thread Safety
///
/// The client is cheap to clone and safe to share across tasks. Each clone
/// shares the underlying HTTP connection pool.
#[derive(Clone)]
pub struct RotaClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl fmt::Debug for RotaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotaClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl RotaClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// A blank token is treated as no token.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let invalid = |reason: String| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };

        // Url::join drops the last path segment unless it ends with a slash.
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let parsed = Url::parse(&normalized).map_err(|err| invalid(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", parsed.scheme())));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: parsed,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The read endpoint for an entity feed, e.g. `<base>/rota/shifts`.
    pub fn endpoint(&self, kind: EntityKind) -> Result<Url, ApiError> {
        self.join(&format!("rota/{}", kind.as_str()))
    }

    fn join(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: err.to_string(),
            })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetches every record of `kind` in `range`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        range: &DateRange,
    ) -> Result<Vec<T>, ApiError> {
        let url = self.endpoint(kind)?;
        tracing::debug!(%kind, %range, "fetching records");

        let request = self
            .http
            .get(url)
            .query(&range.query())
            .header(ACCEPT, "application/json");
        let response = self.authorize(request).send().await?;
        let body = read_body(response).await?;
        decode_records(kind, &body)
    }

    pub async fn shifts(&self, range: &DateRange) -> Result<Vec<Shift>, ApiError> {
        self.fetch(EntityKind::Shifts, range).await
    }

    pub async fn timesheets(&self, range: &DateRange) -> Result<Vec<Timesheet>, ApiError> {
        self.fetch(EntityKind::Timesheets, range).await
    }

    pub async fn events(&self, range: &DateRange) -> Result<Vec<Event>, ApiError> {
        self.fetch(EntityKind::Events, range).await
    }

    pub async fn calls(&self, range: &DateRange) -> Result<Vec<CallRecord>, ApiError> {
        self.fetch(EntityKind::Calls, range).await
    }

    pub async fn presence(&self, range: &DateRange) -> Result<Vec<PersonPresence>, ApiError> {
        self.fetch(EntityKind::Presence, range).await
    }

    /// Deletes an exception event.
    ///
    /// Deleting an event that is already gone succeeds.
    pub async fn remove_event(&self, id: &EventId) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RemoveEventRequest<'a> {
            event_id: &'a str,
        }

        let url = self.join(REMOVE_EVENT_PATH)?;
        let request = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&RemoveEventRequest {
                event_id: id.as_str(),
            });
        let response = self.authorize(request).send().await?;
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            tracing::info!(
                event_id = %id,
                status = %response.status(),
                "event already removed"
            );
            return Ok(());
        }
        read_body(response).await?;
        tracing::info!(event_id = %id, "event removed");
        Ok(())
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(parse_api_error(status.as_u16(), &body).unwrap_or_else(|| {
            ApiError::Api {
                status: status.as_u16(),
                message: truncate(body.trim(), MAX_ERROR_BODY),
            }
        }));
    }
    Ok(body)
}

fn parse_api_error(status: u16, body: &str) -> Option<ApiError> {
    let payload: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = payload
        .get("message")
        .or_else(|| payload.get("error"))
        .and_then(serde_json::Value::as_str)?;
    Some(ApiError::Api {
        status,
        message: message.to_string(),
    })
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Decodes a read-endpoint body into records, skipping the malformed ones.
///
/// Accepts a bare array or an object wrapping it under `data`. `null` is
/// an empty batch.
pub fn decode_records<T: DeserializeOwned>(
    kind: EntityKind,
    body: &str,
) -> Result<Vec<T>, ApiError> {
    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| ApiError::InvalidResponse(format!("{kind}: {err}")))?;
    let items = match payload {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(ApiError::InvalidResponse(format!(
                    "{kind}: expected an array of records"
                )));
            }
        },
        _ => {
            return Err(ApiError::InvalidResponse(format!(
                "{kind}: expected an array of records"
            )));
        }
    };

    let total = items.len();
    let records: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(%kind, index, error = %err, "skipping malformed record");
                None
            }
        })
        .collect();
    if records.len() < total {
        tracing::debug!(%kind, kept = records.len(), total, "decoded batch with skips");
    }
    Ok(records)
}
