//! REST client for the SENTINEL backend (`/api/v1`).
//!
//! DESIGN
//! ======
//! `BackendApi` is the seam every state component talks through, so tests can
//! swap in an in-memory double. `HttpBackend` is the reqwest implementation.
//! Each call takes the bearer token explicitly: components capture it from the
//! session context at request start, which is what lets them tell a stale
//! response from a current one.
//!
//! ERROR HANDLING
//! ==============
//! Every failure collapses into `RequestError`. Non-2xx bodies are scanned
//! for a FastAPI-style `{"detail": ...}` so operators see the backend's own
//! explanation where one exists.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{AdminLogEntry, AdminStats, ExportFormat, Finding, FindingStatus, ManualEntry, NewSource, RecordId, Source, StatusUpdate};
use crate::config::HttpTimeouts;
use crate::error::{ErrorCode, RequestError};

pub const API_PREFIX: &str = "/api/v1";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// TRAIT
// =============================================================================

/// Backend operations consumed by the console. Enables mocking in tests.
#[async_trait::async_trait]
pub trait BackendApi: Send + Sync {
    async fn list_findings(&self, token: &str) -> Result<Vec<Finding>, RequestError>;
    async fn create_manual_finding(&self, token: &str, entry: &ManualEntry) -> Result<(), RequestError>;
    async fn update_finding_status(&self, token: &str, id: &RecordId, status: FindingStatus) -> Result<(), RequestError>;
    async fn delete_finding(&self, token: &str, id: &RecordId) -> Result<(), RequestError>;
    async fn simulate_social_scan(&self, token: &str) -> Result<(), RequestError>;
    async fn list_sources(&self, token: &str) -> Result<Vec<Source>, RequestError>;
    async fn create_source(&self, token: &str, source: &NewSource) -> Result<(), RequestError>;
    async fn delete_source(&self, token: &str, id: &RecordId) -> Result<(), RequestError>;
    async fn export_report(&self, token: &str, format: ExportFormat) -> Result<Vec<u8>, RequestError>;
    async fn admin_logs(&self, token: &str) -> Result<Vec<AdminLogEntry>, RequestError>;
    async fn admin_stats(&self, token: &str) -> Result<AdminStats, RequestError>;
}

// =============================================================================
// ENDPOINTS
// =============================================================================

fn findings_endpoint(cache_buster: u128) -> String {
    format!("/findings?t={cache_buster}")
}

fn finding_endpoint(id: &RecordId) -> String {
    format!("/findings/{id}")
}

fn source_endpoint(id: &RecordId) -> String {
    format!("/sources/{id}")
}

fn export_endpoint(format: ExportFormat) -> String {
    format!("/export/{}", format.extension())
}

/// Milliseconds since the Unix epoch; appended to list fetches so no cache
/// between here and the backend can serve a stale collection.
fn cache_buster() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// Pull the `detail` field out of an error body. FastAPI sends a string for
/// `HTTPException` and an array of objects for validation failures.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>();
            if msgs.is_empty() { None } else { Some(msgs.join("; ")) }
        }
        _ => None,
    }
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client for `base_url` (origin only, e.g. `http://localhost:8000`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| RequestError::Transport(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(token)
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response, RequestError> {
        let request_id = Uuid::new_v4();
        let response = builder
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await
            .map_err(|e| {
                let err = RequestError::from(e);
                warn!(%request_id, path, code = err.error_code(), error = %err, "backend request failed");
                err
            })?;

        let status = response.status();
        debug!(%request_id, path, status = status.as_u16(), "backend response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = RequestError::Status { status: status.as_u16(), detail: extract_detail(&body) };
        warn!(%request_id, path, code = err.error_code(), error = %err, "backend rejected request");
        Err(err)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, RequestError> {
        let response = self
            .send(self.request(Method::GET, path, token), path)
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()))
    }

    async fn send_json(&self, method: Method, path: &str, token: &str, body: &impl Serialize) -> Result<(), RequestError> {
        self.send(self.request(method, path, token).json(body), path)
            .await?;
        Ok(())
    }

    async fn send_empty(&self, method: Method, path: &str, token: &str) -> Result<(), RequestError> {
        self.send(self.request(method, path, token), path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BackendApi for HttpBackend {
    async fn list_findings(&self, token: &str) -> Result<Vec<Finding>, RequestError> {
        self.get_json(&findings_endpoint(cache_buster()), token)
            .await
    }

    async fn create_manual_finding(&self, token: &str, entry: &ManualEntry) -> Result<(), RequestError> {
        self.send_json(Method::POST, "/findings/manual", token, entry)
            .await
    }

    async fn update_finding_status(&self, token: &str, id: &RecordId, status: FindingStatus) -> Result<(), RequestError> {
        self.send_json(Method::PATCH, &finding_endpoint(id), token, &StatusUpdate { status })
            .await
    }

    async fn delete_finding(&self, token: &str, id: &RecordId) -> Result<(), RequestError> {
        self.send_empty(Method::DELETE, &finding_endpoint(id), token)
            .await
    }

    async fn simulate_social_scan(&self, token: &str) -> Result<(), RequestError> {
        self.send_empty(Method::POST, "/simulate/social", token)
            .await
    }

    async fn list_sources(&self, token: &str) -> Result<Vec<Source>, RequestError> {
        self.get_json("/sources", token).await
    }

    async fn create_source(&self, token: &str, source: &NewSource) -> Result<(), RequestError> {
        self.send_json(Method::POST, "/sources", token, source)
            .await
    }

    async fn delete_source(&self, token: &str, id: &RecordId) -> Result<(), RequestError> {
        self.send_empty(Method::DELETE, &source_endpoint(id), token)
            .await
    }

    async fn export_report(&self, token: &str, format: ExportFormat) -> Result<Vec<u8>, RequestError> {
        let path = export_endpoint(format);
        let response = self
            .send(self.request(Method::GET, &path, token), &path)
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn admin_logs(&self, token: &str) -> Result<Vec<AdminLogEntry>, RequestError> {
        self.get_json("/admin/logs", token).await
    }

    async fn admin_stats(&self, token: &str) -> Result<AdminStats, RequestError> {
        self.get_json("/admin/stats", token).await
    }
}
