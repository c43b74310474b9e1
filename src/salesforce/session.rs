//! Authenticated session for one Salesforce org.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::AppError;

/// Path segment of the SOAP partner endpoint.
pub const SOAP_PATH: &str = "/services/Soap/u/";

/// Path segment of the Bulk API 1.0 async endpoint.
pub const ASYNC_PATH: &str = "/services/async/";

/// Strips a single leading `v` from an API version ("v62.0" -> "62.0").
pub fn clean_api_version(raw: &str) -> &str {
    raw.strip_prefix('v').unwrap_or(raw)
}

/// Endpoint and credential for one org.
///
/// Immutable once built. The session token is wrapped in `SecretString`
/// and redacted from `Debug` output.
#[derive(Clone)]
pub struct Session {
    service_endpoint: Url,
    session_token: SecretString,
    api_version: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("service_endpoint", &self.service_endpoint.as_str())
            .field("session_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Session {
    /// Builds a session whose service endpoint is
    /// `{instance_url}/services/Soap/u/{version}`.
    ///
    /// A leading `v` on `api_version` and a trailing `/` on `instance_url`
    /// are removed first.
    pub fn new(
        instance_url: &str,
        api_version: &str,
        session_token: SecretString,
    ) -> Result<Self, url::ParseError> {
        let version = clean_api_version(api_version.trim());
        let endpoint = format!(
            "{}{}{}",
            instance_url.trim().trim_end_matches('/'),
            SOAP_PATH,
            version
        );

        Ok(Self {
            service_endpoint: Url::parse(&endpoint)?,
            session_token,
            api_version: version.to_string(),
        })
    }

    /// SOAP partner endpoint, e.g. `https://acme.my.salesforce.com/services/Soap/u/62.0`.
    pub fn service_endpoint(&self) -> &Url {
        &self.service_endpoint
    }

    pub fn session_token(&self) -> &SecretString {
        &self.session_token
    }

    /// API version without the leading `v`.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Scheme and host of the org, used as the base for REST calls.
    pub fn instance_url(&self) -> Result<Url, AppError> {
        Url::parse(&self.service_endpoint.origin().ascii_serialization())
            .map_err(|_| AppError::Internal("Invalid instance URL".to_string()))
    }

    /// Bulk API endpoint derived by swapping the SOAP path for the async path.
    pub fn bulk_endpoint(&self) -> Result<Url, AppError> {
        let rewritten = self
            .service_endpoint
            .as_str()
            .replacen(SOAP_PATH, ASYNC_PATH, 1);
        Url::parse(&rewritten)
            .map_err(|_| AppError::Internal("Invalid bulk endpoint".to_string()))
    }

    pub(crate) fn token(&self) -> &str {
        self.session_token.expose_secret()
    }
}
