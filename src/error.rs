use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "access_token",
    "x-sfdc-session",
    "x-app-uuid",
    "authorization:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for display.
/// If sensitive content is detected, returns the fallback instead.
pub(crate) fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Startup ───────────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ── Broker ────────────────────────────────────────────────────────────────
    #[error("Authorization broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("Malformed authorization response: {0}")]
    MalformedAuthorizationResponse(String),

    #[error("Failed to initialize connection for: {connection}")]
    ConnectionInit {
        connection: String,
        #[source]
        source: Box<AppError>,
    },

    // ── Registry ──────────────────────────────────────────────────────────────
    #[error("No Salesforce connection found for: {0}")]
    UnknownConnection(String),

    // ── Salesforce API ────────────────────────────────────────────────────────
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Bulk submission failed: {0}")]
    BulkSubmission(String),

    #[error("Bulk status poll failed: {0}")]
    BulkPoll(String),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP listener failed: {0}")]
    Listener(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps a per-connection failure so startup errors name the connection.
    pub fn connection_init(connection: impl Into<String>, source: AppError) -> Self {
        AppError::ConnectionInit {
            connection: connection.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, unwrapping `ConnectionInit` layers.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::ConnectionInit { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Message safe to show on the read page.
    /// Never leaks tokens or session identifiers.
    pub fn display_message(&self) -> String {
        match self {
            AppError::Configuration(msg) => {
                sanitize_message(msg, "The service is not configured correctly.")
            }
            AppError::InvalidArgument(msg) => {
                sanitize_message(msg, "An invalid argument was supplied.")
            }
            AppError::BrokerUnavailable(_) => {
                "Could not obtain org credentials from the AppLink broker.".into()
            }
            AppError::MalformedAuthorizationResponse(_) => {
                "The AppLink broker returned an unexpected authorization payload.".into()
            }
            AppError::ConnectionInit { connection, source } => {
                format!("Connection '{}': {}", connection, source.display_message())
            }
            AppError::UnknownConnection(name) => {
                format!("No Salesforce connection named '{}' is configured.", name)
            }
            AppError::Query(msg) => sanitize_message(msg, "The Salesforce query failed."),
            AppError::BulkSubmission(msg) => {
                sanitize_message(msg, "The bulk job could not be submitted.")
            }
            AppError::BulkPoll(msg) => {
                sanitize_message(msg, "The bulk job status could not be read.")
            }
            AppError::ConnectionFailed(_) => "Could not connect to Salesforce.".into(),
            AppError::Listener(msg) => sanitize_message(msg, "The HTTP listener failed."),
            AppError::Internal(_) => "Something went wrong. Please try again.".into(),
        }
    }
}
