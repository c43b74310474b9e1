//! Salesforce HTTP client with secure credential handling and safe logging.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use tracing::info;
use url::Url;

use crate::error::AppError;
use crate::salesforce::session::Session;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all outbound requests.
const CLIENT_USER_AGENT: &str = concat!("applink-bulk/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Reduces a URL to its path for logging.
///
/// Scheme, host, query and fragment are dropped, so SOQL text and any
/// credential-bearing parameters never reach the logs.
pub fn sanitize_url_for_logs(url: &Url) -> &str {
    url.path()
}

// ─────────────────────────────────────────────────────────────────────────────
// SalesforceClient
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client bound to one org's `Session`.
///
/// Sessions are never refreshed; a `401` is returned to the caller like any
/// other status.
#[derive(Clone)]
pub struct SalesforceClient {
    http: reqwest::Client,
    session: Session,
}

impl SalesforceClient {
    /// Creates a client for `session` sharing the given connection pool.
    pub fn new(http: reqwest::Client, session: Session) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Builds a full URL by joining the path with the org's instance URL.
    pub fn build_url(&self, path: &str) -> Result<Url, AppError> {
        self.session
            .instance_url()?
            .join(path)
            .map_err(|_| AppError::Internal(format!("Invalid path: {}", path)))
    }

    /// Executes a body-less request against the instance with the session as
    /// bearer token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConnectionFailed` for network errors. HTTP error
    /// statuses are returned as responses for the caller to map.
    pub async fn request_authed(
        &self,
        method: Method,
        url: Url,
    ) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let sanitized_url = sanitize_url_for_logs(&url).to_string();

        let result = self
            .http
            .request(method.clone(), url)
            .bearer_auth(self.session.token())
            .send()
            .await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                let x_request_id = response
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                info!(
                    "[SFDC] {} {} {} {}ms {}",
                    method,
                    sanitized_url,
                    response.status().as_u16(),
                    duration_ms,
                    x_request_id
                );

                Ok(response)
            }
            Err(_) => {
                // The raw reqwest error may carry the full URL, so it is not logged.
                info!(
                    "[SFDC] {} {} FAILED {}ms",
                    method, sanitized_url, duration_ms
                );
                Err(AppError::ConnectionFailed(
                    "Connection to Salesforce failed".to_string(),
                ))
            }
        }
    }
}

/// Builds the shared HTTP client used for broker and Salesforce calls.
pub fn build_http_client() -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn limits_url(client: &SalesforceClient) -> Url {
        client.build_url("/services/data/v62.0/limits").unwrap()
    }

    fn test_session(instance_url: &str) -> Session {
        Session::new(instance_url, "v62.0", SecretString::from("test_token".to_string())).unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // URL Sanitization Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn sanitize_strips_scheme_and_host() {
        let url = Url::parse("https://acme.my.salesforce.com/services/data/v62.0/query").unwrap();

        let result = sanitize_url_for_logs(&url);

        assert_eq!(result, "/services/data/v62.0/query");
        assert!(!result.contains("acme.my.salesforce.com"));
    }

    #[test]
    fn sanitize_excludes_query_string() {
        let url = Url::parse(
            "https://acme.my.salesforce.com/services/data/v62.0/query?q=SELECT+Id&sid=secret",
        )
        .unwrap();

        let result = sanitize_url_for_logs(&url);

        assert_eq!(result, "/services/data/v62.0/query");
        assert!(!result.contains("secret"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // SalesforceClient Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn build_http_client_succeeds() {
        assert!(build_http_client().is_ok());
    }

    #[test]
    fn build_url_joins_instance_and_path() {
        let client = SalesforceClient::new(
            reqwest::Client::new(),
            test_session("https://acme.my.salesforce.com"),
        );

        let url = client.build_url("/services/data/v62.0/query").unwrap();

        assert_eq!(
            url.as_str(),
            "https://acme.my.salesforce.com/services/data/v62.0/query"
        );
    }

    #[tokio::test]
    async fn request_authed_sends_session_as_bearer() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/limits"))
            .and(header("Authorization", "Bearer test_token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SalesforceClient::new(reqwest::Client::new(), test_session(&mock_server.uri()));

        let response = client
            .request_authed(Method::GET, limits_url(&client))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn request_authed_returns_unauthorized_without_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/limits"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SalesforceClient::new(reqwest::Client::new(), test_session(&mock_server.uri()));

        let response = client
            .request_authed(Method::GET, limits_url(&client))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 401);
    }

    #[tokio::test]
    async fn request_authed_maps_transport_failure() {
        // Nothing listens on port 9 on the loopback interface.
        let client = SalesforceClient::new(
            reqwest::Client::new(),
            test_session("http://127.0.0.1:9"),
        );

        let result = client
            .request_authed(Method::GET, limits_url(&client))
            .await;

        assert!(matches!(result, Err(AppError::ConnectionFailed(_))));
    }
}
