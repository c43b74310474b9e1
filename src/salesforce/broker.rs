//! Heroku AppLink authorization broker client.
//!
//! Exchanges a connection name for an org `Session` with a single
//! authenticated lookup:
//!
//! ```text
//! GET {broker}/authorizations/{connection_name}
//! Authorization: Bearer {broker_token}
//! X-App-UUID: {app_id}
//! ```
//!
//! The response is parsed into typed structs; any missing nested field fails
//! with `AppError::MalformedAuthorizationResponse`. There is no retry and no
//! caching.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::config::BrokerConfig;
use crate::error::AppError;
use crate::salesforce::client::sanitize_url_for_logs;
use crate::salesforce::session::Session;

/// Header carrying the application identifier.
pub const APP_ID_HEADER: &str = "X-App-UUID";

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// Authorization payload returned by the broker.
#[derive(Debug, Deserialize)]
pub struct AuthorizationRecord {
    pub org: OrgAuthorization,
}

#[derive(Debug, Deserialize)]
pub struct OrgAuthorization {
    pub instance_url: String,
    pub api_version: String,
    pub user_auth: UserAuth,
}

#[derive(Deserialize)]
pub struct UserAuth {
    pub access_token: String,
}

impl std::fmt::Debug for UserAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAuth")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl AuthorizationRecord {
    /// Consumes the record and builds a `Session`.
    ///
    /// # Errors
    ///
    /// `AppError::MalformedAuthorizationResponse` if a field is blank or the
    /// instance URL cannot be parsed or carries a path.
    pub fn into_session(self) -> Result<Session, AppError> {
        let org = self.org;

        if org.instance_url.trim().is_empty() {
            return Err(malformed("org.instance_url is blank"));
        }
        if org.api_version.trim().is_empty() {
            return Err(malformed("org.api_version is blank"));
        }
        if org.user_auth.access_token.trim().is_empty() {
            return Err(malformed("org.user_auth.access_token is blank"));
        }

        // Session endpoints are built from the origin; a path would be lost.
        if let Ok(parsed) = Url::parse(org.instance_url.trim()) {
            if parsed.path() != "/" {
                return Err(malformed("org.instance_url must not include a path"));
            }
        }

        let token = SecretString::from(org.user_auth.access_token);
        Session::new(&org.instance_url, &org.api_version, token)
            .map_err(|e| malformed(&format!("org.instance_url is not a valid URL: {}", e)))
    }
}

fn malformed(msg: &str) -> AppError {
    AppError::MalformedAuthorizationResponse(msg.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// BrokerClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the AppLink `/authorizations` endpoint.
#[derive(Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
    app_id: String,
}

impl BrokerClient {
    pub fn new(http: reqwest::Client, config: &BrokerConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            app_id: config.app_id.clone(),
        }
    }

    /// Builds `{base}/authorizations/{name}` with the name as one encoded segment.
    pub fn authorization_url(&self, connection_name: &str) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration("Broker URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("authorizations")
            .push(connection_name);
        Ok(url)
    }

    /// Resolves a connection name to an authenticated session.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidArgument` - blank connection name
    /// - `AppError::BrokerUnavailable` - transport failure or non-2xx status
    /// - `AppError::MalformedAuthorizationResponse` - missing `org` or nested fields
    pub async fn resolve(&self, connection_name: &str) -> Result<Session, AppError> {
        let connection_name = connection_name.trim();
        if connection_name.is_empty() {
            return Err(AppError::InvalidArgument(
                "Connection name not provided".to_string(),
            ));
        }

        let url = self.authorization_url(connection_name)?;
        let sanitized_url = sanitize_url_for_logs(&url).to_string();

        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .header(APP_ID_HEADER, &self.app_id)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|_| {
                warn!("[BROKER] GET {} FAILED", sanitized_url);
                AppError::BrokerUnavailable("Could not reach the AppLink broker".to_string())
            })?;

        let status = response.status();
        info!("[BROKER] GET {} -> {}", sanitized_url, status.as_u16());

        if !status.is_success() {
            return Err(AppError::BrokerUnavailable(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            )));
        }

        let body = response.bytes().await.map_err(|_| {
            AppError::BrokerUnavailable("Failed to read broker response".to_string())
        })?;

        let record: AuthorizationRecord = serde_json::from_slice(&body)
            .map_err(|e| malformed(&format!("Invalid response from AppLink broker: {}", e)))?;

        let session = record.into_session()?;
        info!(
            "[BROKER] Resolved connection '{}' (API {})",
            connection_name,
            session.api_version()
        );

        Ok(session)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
