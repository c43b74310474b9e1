//! Salesforce Bulk API 1.0 client for CSV insert jobs.
//!
//! This module provides functionality to:
//! - Create a bulk job against the org's async endpoint
//! - Submit a CSV payload as a batch
//! - List the job's batches with their current state
//!
//! Requests authenticate with the `X-SFDC-Session` header. Job and batch
//! descriptors of CSV jobs travel as XML in the async API namespace.
//!
//! # Security
//!
//! - Raw CSV contents are never logged
//! - Session headers are never logged
//! - Only HTTP method, path, and status codes are logged

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;
use url::Url;

use crate::error::AppError;
use crate::salesforce::session::Session;

/// Header carrying the session id on Bulk API 1.0 requests.
pub const SESSION_HEADER: &str = "X-SFDC-Session";

/// XML namespace of async API descriptors.
pub const ASYNC_API_NAMESPACE: &str = "http://www.force.com/2009/06/asyncapi/dataload";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const XML_CONTENT_TYPE: &str = "application/xml; charset=UTF-8";

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// `<jobInfo>` body for creating a bulk job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "jobInfo", rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    operation: &'static str,
    object: String,
    content_type: &'static str,
}

impl CreateJobRequest {
    /// CSV insert job for `object`.
    pub fn csv_insert(object: impl Into<String>) -> Self {
        Self {
            xmlns: ASYNC_API_NAMESPACE,
            operation: "insert",
            object: object.into(),
            content_type: "CSV",
        }
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    fn to_xml(&self) -> Result<String, AppError> {
        let body = quick_xml::se::to_string(self).map_err(|e| {
            AppError::BulkSubmission(format!("Failed to encode job request: {}", e))
        })?;
        Ok(format!("{}{}", XML_DECLARATION, body))
    }
}

/// The created job as reported by Salesforce.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: String,
    #[serde(default)]
    pub state: String,
}

/// Processing state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Queued,
    InProgress,
    Completed,
    Failed,
    NotProcessed,
    Unknown,
}

impl BatchState {
    /// `Completed` and `Failed` end the batch lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Failed)
    }

    fn from_wire(raw: &str) -> Self {
        match raw.trim() {
            "Queued" => BatchState::Queued,
            "InProgress" => BatchState::InProgress,
            "Completed" => BatchState::Completed,
            "Failed" => BatchState::Failed,
            "Not Processed" | "NotProcessed" => BatchState::NotProcessed,
            _ => BatchState::Unknown,
        }
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BatchState::Queued => "Queued",
            BatchState::InProgress => "InProgress",
            BatchState::Completed => "Completed",
            BatchState::Failed => "Failed",
            BatchState::NotProcessed => "NotProcessed",
            BatchState::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

fn batch_state<'de, D>(deserializer: D) -> Result<BatchState, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(BatchState::from_wire(&String::deserialize(deserializer)?))
}

/// `<batchInfo>` for one batch of a bulk job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    pub id: String,
    pub job_id: String,
    #[serde(deserialize_with = "batch_state")]
    pub state: BatchState,
    /// Reason reported by Salesforce for failed batches.
    #[serde(default)]
    pub state_message: Option<String>,
    #[serde(default)]
    pub number_records_processed: Option<u64>,
    #[serde(default)]
    pub number_records_failed: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BatchInfoList {
    #[serde(rename = "batchInfo", default)]
    batch_info: Vec<BatchInfo>,
}

/// `<error>` body returned by the async API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AsyncApiError {
    exception_code: String,
    exception_message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// BulkApiClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Bulk API 1.0 async endpoint of one org.
#[derive(Clone)]
pub struct BulkApiClient {
    client: reqwest::Client,
    /// Async endpoint, e.g. `https://acme.my.salesforce.com/services/async/62.0`.
    endpoint: Url,
    session_token: SecretString,
}

impl BulkApiClient {
    /// Derives the async endpoint and credential from a session.
    pub fn from_session(client: reqwest::Client, session: &Session) -> Result<Self, AppError> {
        Ok(Self {
            client,
            endpoint: session.bulk_endpoint()?,
            session_token: session.session_token().clone(),
        })
    }

    /// Creates a new bulk job.
    ///
    /// # Errors
    ///
    /// `AppError::BulkSubmission` for transport failures and API errors.
    pub async fn create_job(&self, req: &CreateJobRequest) -> Result<JobInfo, AppError> {
        let url = self.build_url(&["job"])?;

        info!("[BULK] POST /job (insert {})", req.object());

        let response = self
            .client
            .post(url)
            .header(SESSION_HEADER, self.session_token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(req.to_xml()?)
            .send()
            .await
            .map_err(|_| AppError::BulkSubmission("Job creation request failed".to_string()))?;

        let status = response.status();
        info!("[BULK] POST /job -> {}", status.as_u16());

        let job: JobInfo = read_xml(response, status)
            .await
            .map_err(AppError::BulkSubmission)?;

        info!("[BULK] Job {} created ({})", redact_id(&job.id), job.state);
        Ok(job)
    }

    /// Submits CSV data as a new batch of the job.
    ///
    /// # Errors
    ///
    /// `AppError::BulkSubmission` for transport failures and API errors.
    pub async fn create_batch(&self, job_id: &str, csv: Vec<u8>) -> Result<BatchInfo, AppError> {
        let url = self.build_url(&["job", job_id, "batch"])?;

        info!(
            "[BULK] POST /job/{}/batch ({} bytes)",
            redact_id(job_id),
            csv.len()
        );

        let response = self
            .client
            .post(url)
            .header(SESSION_HEADER, self.session_token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(csv)
            .send()
            .await
            .map_err(|_| AppError::BulkSubmission("Batch upload failed".to_string()))?;

        let status = response.status();
        info!(
            "[BULK] POST /job/{}/batch -> {}",
            redact_id(job_id),
            status.as_u16()
        );

        read_xml(response, status)
            .await
            .map_err(AppError::BulkSubmission)
    }

    /// Lists every batch of the job with its last known state.
    ///
    /// # Errors
    ///
    /// `AppError::BulkPoll` for transport failures and API errors.
    pub async fn batch_info_list(&self, job_id: &str) -> Result<Vec<BatchInfo>, AppError> {
        let url = self.build_url(&["job", job_id, "batch"])?;

        let response = self
            .client
            .get(url)
            .header(SESSION_HEADER, self.session_token.expose_secret())
            .send()
            .await
            .map_err(|_| AppError::BulkPoll("Batch status request failed".to_string()))?;

        let status = response.status();
        info!(
            "[BULK] GET /job/{}/batch -> {}",
            redact_id(job_id),
            status.as_u16()
        );

        let list: BatchInfoList = read_xml(response, status)
            .await
            .map_err(AppError::BulkPoll)?;

        Ok(list.batch_info)
    }

    /// Appends path segments to the async endpoint.
    fn build_url(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Bulk endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Decodes a success body as `T`, or renders an error body as
/// `[code] message` (falling back to the status line).
async fn read_xml<T: DeserializeOwned>(
    response: reqwest::Response,
    status: reqwest::StatusCode,
) -> Result<T, String> {
    let body = response
        .text()
        .await
        .map_err(|_| String::from("Unable to read response body"))?;

    if status.is_success() {
        return quick_xml::de::from_str(&body)
            .map_err(|e| format!("Failed to parse async API response: {}", e));
    }

    if let Ok(error) = quick_xml::de::from_str::<AsyncApiError>(&body) {
        return Err(format!(
            "[{}] {}",
            error.exception_code, error.exception_message
        ));
    }

    Err(format!(
        "HTTP {} - {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown error")
    ))
}

/// Redacts a job ID for logging (shows first 8 chars).
pub(crate) fn redact_id(id: &str) -> String {
    match id.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &id[..idx]),
        None => id.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
