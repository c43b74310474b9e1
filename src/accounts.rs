//! Account listing across every registered org.

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{sanitize_message, AppError};
use crate::registry::ConnectionRegistry;
use crate::salesforce::client::SalesforceClient;
use crate::salesforce::rest::RestQueryClient;

pub const ACCOUNTS_SOQL: &str = "SELECT Name, Id FROM Account ORDER BY Name";

/// Prefix of the single line shown for a connection whose query failed.
pub const ERROR_PREFIX: &str = "Error retrieving accounts: ";

/// Display lines on success, a sanitized error message on failure.
pub type AccountsResult = Result<Vec<String>, String>;

/// Listing result for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAccounts {
    pub connection: String,
    pub result: AccountsResult,
}

impl ConnectionAccounts {
    /// Lines to render: the accounts, or one error line.
    pub fn display_lines(&self) -> Vec<String> {
        match &self.result {
            Ok(lines) => lines.clone(),
            Err(message) => vec![format!("{}{}", ERROR_PREFIX, message)],
        }
    }
}

/// Renders one account record as `"{Name} (ID: {Id})"`.
pub fn format_account(record: &Value) -> String {
    format!(
        "{} (ID: {})",
        field_or_null(record, "Name"),
        field_or_null(record, "Id")
    )
}

fn field_or_null(record: &Value, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "null".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Lists every account of one org, ordered by name.
pub async fn list_accounts(client: &RestQueryClient) -> Result<Vec<String>, AppError> {
    let result = client.query(ACCOUNTS_SOQL).await?;
    Ok(result.records.iter().map(format_account).collect())
}

/// Lists accounts for every registered connection in name order.
///
/// A failing connection yields an `Err` entry; the others are unaffected.
pub async fn list_all_accounts(
    registry: &ConnectionRegistry,
    http: &reqwest::Client,
) -> Vec<ConnectionAccounts> {
    let mut listings = Vec::with_capacity(registry.len());

    for (name, session) in registry.iter() {
        let client = RestQueryClient::new(SalesforceClient::new(http.clone(), session.clone()));

        let result = match list_accounts(&client).await {
            Ok(lines) => {
                info!("[REST] {}: {} account(s)", name, lines.len());
                Ok(lines)
            }
            Err(e) => {
                warn!("[REST] {}: failed to list accounts: {}", name, e);
                Err(sanitize_message(
                    &e.to_string(),
                    &e.display_message(),
                ))
            }
        };

        listings.push(ConnectionAccounts {
            connection: name.to_string(),
            result,
        });
    }

    listings
}
