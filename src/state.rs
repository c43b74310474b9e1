//! Shared state for the HTTP read surface.

use std::sync::Arc;

use crate::registry::ConnectionRegistry;

/// State cloned into every request handler.
///
/// Holds only read-only values, so no locking is needed.
#[derive(Clone)]
pub struct AppState {
    /// Sessions resolved at startup.
    pub registry: Arc<ConnectionRegistry>,
    /// Pooled HTTP client for Salesforce calls.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(registry: Arc<ConnectionRegistry>, http: reqwest::Client) -> Self {
        Self { registry, http }
    }
}
