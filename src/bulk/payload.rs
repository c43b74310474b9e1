//! CSV payload for the sample account load.

use csv::{Terminator, WriterBuilder};

use crate::error::AppError;

/// Number of account rows in the generated payload.
pub const ACCOUNT_ROW_COUNT: usize = 1000;

/// Name prefix shared by every generated account. The guard query matches on it.
pub const ACCOUNT_NAME_PREFIX: &str = "Bulk Account";

pub const CSV_HEADER: [&str; 6] = [
    "Name",
    "BillingStreet",
    "BillingCity",
    "BillingState",
    "BillingPostalCode",
    "BillingCountry",
];

/// One generated account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub name: String,
    pub billing_street: String,
    pub billing_city: String,
    pub billing_state: String,
    pub billing_postal_code: String,
    pub billing_country: String,
}

impl AccountRow {
    /// Row `index` (1-based) of the sample load.
    pub fn sample(index: usize) -> Self {
        Self {
            name: format!("{} {}", ACCOUNT_NAME_PREFIX, index),
            billing_street: format!("123 Main St Apt {}", index),
            billing_city: "Sample City".to_string(),
            billing_state: "CA".to_string(),
            billing_postal_code: format!("900{}", index % 100),
            billing_country: "USA".to_string(),
        }
    }

    fn fields(&self) -> [&str; 6] {
        [
            &self.name,
            &self.billing_street,
            &self.billing_city,
            &self.billing_state,
            &self.billing_postal_code,
            &self.billing_country,
        ]
    }
}

/// Rows `1..=ACCOUNT_ROW_COUNT`.
pub fn sample_rows() -> impl Iterator<Item = AccountRow> {
    (1..=ACCOUNT_ROW_COUNT).map(AccountRow::sample)
}

/// Serializes the header plus `rows` as CSV with `\n` line endings.
pub fn write_accounts_csv<I>(rows: I) -> Result<Vec<u8>, AppError>
where
    I: IntoIterator<Item = AccountRow>,
{
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(ACCOUNT_ROW_COUNT * 96));

    writer
        .write_record(CSV_HEADER)
        .map_err(|e| AppError::Internal(format!("Failed to write CSV header: {}", e)))?;

    for row in rows {
        writer
            .write_record(row.fields())
            .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV payload: {}", e)))
}

/// The full sample payload submitted by the bulk load.
pub fn generate_account_csv() -> Result<Vec<u8>, AppError> {
    write_accounts_csv(sample_rows())
}
