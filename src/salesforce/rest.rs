//! Salesforce REST API client for SOQL query execution with pagination.
//!
//! - **Automatic pagination** - Follows `nextRecordsUrl` until `done`
//! - **Secure logging** - Never logs raw SOQL queries or sensitive data
//! - **Salesforce error mapping** - Parses Salesforce API errors into `AppError::Query`

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::AppError;
use crate::salesforce::client::SalesforceClient;

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types (match Salesforce JSON exactly)
// ─────────────────────────────────────────────────────────────────────────────

/// Mirrors the Salesforce query response JSON.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQueryResponse {
    /// Total number of records that match the query (not just this page).
    total_size: u64,
    /// Whether this is the last page of results.
    done: bool,
    /// Relative URL of the next page. Only present if `done` is false.
    next_records_url: Option<String>,
    /// Records in this page. Absent or null is treated as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    records: Vec<serde_json::Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Salesforce API error response format.
/// Salesforce returns errors as an array of error objects.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSalesforceError {
    message: String,
    error_code: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a SOQL query execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The records returned by the query, across all pages.
    pub records: Vec<serde_json::Value>,
    /// Total number of records that match the query in Salesforce.
    pub total_size: u64,
}

impl QueryResult {
    /// Returns true when the query matched at least one record.
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RestQueryClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for executing SOQL queries against the Salesforce REST API.
///
/// # Example
///
/// ```ignore
/// let client = RestQueryClient::new(salesforce_client);
/// let result = client.query("SELECT Id, Name FROM Account").await?;
/// println!("Found {} accounts", result.records.len());
/// ```
#[derive(Clone)]
pub struct RestQueryClient {
    client: SalesforceClient,
}

impl RestQueryClient {
    pub fn new(client: SalesforceClient) -> Self {
        Self { client }
    }

    /// Executes a SOQL query and returns all matching records.
    ///
    /// # Errors
    ///
    /// - `AppError::Query` - Query syntax error, expired session or other API error
    /// - `AppError::ConnectionFailed` - Network error
    ///
    /// # Security
    ///
    /// The SOQL text is never logged.
    pub async fn query(&self, soql: &str) -> Result<QueryResult, AppError> {
        let base_path = format!(
            "/services/data/v{}/query",
            self.client.session().api_version()
        );
        let initial_url = self.build_query_url(&base_path, soql)?;

        info!("[REST] Starting SOQL query");

        let mut all_records: Vec<serde_json::Value> = Vec::new();
        let mut total_size: u64 = 0;
        let mut next_url: Option<Url> = Some(initial_url);
        let mut page_count: u32 = 0;

        while let Some(url) = next_url.take() {
            page_count += 1;

            let response = self.execute_query_request(url).await?;

            let wire_response: WireQueryResponse = response
                .json()
                .await
                .map_err(|e| AppError::Query(format!("Failed to parse query response: {}", e)))?;

            if page_count == 1 {
                total_size = wire_response.total_size;
            }

            all_records.extend(wire_response.records);

            if wire_response.done {
                break;
            }

            if let Some(next_records_url) = wire_response.next_records_url {
                next_url = Some(self.client.build_url(&next_records_url)?);
            }
        }

        info!(
            "[REST] Query complete: {} records fetched, {} pages",
            all_records.len(),
            page_count
        );

        Ok(QueryResult {
            records: all_records,
            total_size,
        })
    }

    /// Builds a query URL with the SOQL string properly URL-encoded.
    fn build_query_url(&self, path: &str, soql: &str) -> Result<Url, AppError> {
        let mut url = self.client.build_url(path)?;
        url.query_pairs_mut().append_pair("q", soql);
        Ok(url)
    }

    /// Executes one page request and maps error responses.
    async fn execute_query_request(&self, url: Url) -> Result<reqwest::Response, AppError> {
        let response = self.client.request_authed(Method::GET, url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(query_error(response, status).await);
        }

        Ok(response)
    }
}

/// Maps a failed query response to `AppError::Query`, preferring the first
/// Salesforce `[errorCode] message` entry over the bare status.
async fn query_error(response: reqwest::Response, status: reqwest::StatusCode) -> AppError {
    let body = response.bytes().await.unwrap_or_default();

    let detail = serde_json::from_slice::<Vec<WireSalesforceError>>(&body)
        .ok()
        .and_then(|errors| errors.into_iter().next())
        .map(|error| format!("[{}] {}", error.error_code, error.message))
        .unwrap_or_else(|| {
            format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            )
        });

    AppError::Query(detail)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
