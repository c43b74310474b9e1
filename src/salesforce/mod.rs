//! Salesforce and AppLink API interaction layer.
//!
//! - **Broker** exchanges a connection name for an org `Session`
//! - **REST** runs SOQL queries with pagination
//! - **Bulk API 1.0** creates insert jobs, uploads CSV batches and reports batch state
//! - **Safe logging** never prints tokens or sensitive URL parameters

pub mod broker;
pub mod bulk_api;
pub mod client;
pub mod rest;
pub mod session;

pub use broker::BrokerClient;
pub use bulk_api::{BatchInfo, BatchState, BulkApiClient, CreateJobRequest, JobInfo};
pub use client::{build_http_client, SalesforceClient};
pub use rest::{QueryResult, RestQueryClient};
pub use session::Session;
