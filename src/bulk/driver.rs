//! Background bulk load of sample accounts into one org.
//!
//! A run walks a fixed state machine:
//!
//! ```text
//! NotStarted -> Checking -> Skipped
//!                        -> JobCreated -> BatchSubmitted -> Polling -> Completed | Failed | PollError
//! ```
//!
//! Failures before polling end the run in `GuardError` or `SubmissionError`.
//! Nothing is retried; the terminal outcome is handed to a `BulkObserver`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bulk::payload::{generate_account_csv, ACCOUNT_NAME_PREFIX};
use crate::bulk::scheduler::BulkJobScheduler;
use crate::config::BulkSettings;
use crate::error::AppError;
use crate::registry::ConnectionRegistry;
use crate::salesforce::bulk_api::{
    redact_id, BatchInfo, BatchState, BulkApiClient, CreateJobRequest,
};
use crate::salesforce::client::SalesforceClient;
use crate::salesforce::rest::RestQueryClient;
use crate::salesforce::session::Session;

/// Object loaded by the bulk job.
pub const BULK_OBJECT: &str = "Account";

/// Returns a row when a previous load already inserted the sample accounts.
pub const GUARD_SOQL: &str = "SELECT Id FROM Account WHERE Name LIKE 'Bulk Account%' LIMIT 1";

// ─────────────────────────────────────────────────────────────────────────────
// State & Outcome
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    NotStarted,
    Checking,
    /// Sample accounts already exist; no job was created.
    Skipped,
    JobCreated,
    BatchSubmitted,
    Polling,
    Completed,
    Failed,
    PollError,
    GuardError,
    SubmissionError,
}

/// Terminal result of one run.
#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub connection: String,
    pub state: DriverState,
    pub job_id: Option<String>,
    pub batch_id: Option<String>,
    /// Status polls issued.
    pub polls: u32,
    /// Error or Salesforce state message for unsuccessful runs.
    pub detail: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Observer
// ─────────────────────────────────────────────────────────────────────────────

/// Receives progress and the terminal outcome of a bulk run.
pub trait BulkObserver: Send + Sync {
    fn on_transition(&self, _connection: &str, _state: DriverState) {}

    fn on_batch_status(&self, _connection: &str, _batch: &BatchInfo) {}

    fn on_complete(&self, outcome: &BulkOutcome);
}

/// Reports bulk progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BulkObserver for TracingObserver {
    fn on_transition(&self, connection: &str, state: DriverState) {
        debug!("[BULK] {} -> {:?}", connection, state);
    }

    fn on_batch_status(&self, connection: &str, batch: &BatchInfo) {
        info!(
            "[BULK] {} batch {} state: {} (processed: {}, failed: {})",
            connection,
            redact_id(&batch.id),
            batch.state,
            batch.number_records_processed.unwrap_or(0),
            batch.number_records_failed.unwrap_or(0)
        );
    }

    fn on_complete(&self, outcome: &BulkOutcome) {
        let detail = outcome.detail.as_deref().unwrap_or("-");
        match outcome.state {
            DriverState::Skipped => info!(
                "[BULK] {}: accounts already loaded, skipping bulk job",
                outcome.connection
            ),
            DriverState::Completed => info!(
                "[BULK] {}: batch processing complete after {} polls",
                outcome.connection, outcome.polls
            ),
            DriverState::Failed => warn!(
                "[BULK] {}: batch failed: {}",
                outcome.connection, detail
            ),
            state => error!(
                "[BULK] {}: bulk load ended in {:?}: {}",
                outcome.connection, state, detail
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BulkJobDriver
// ─────────────────────────────────────────────────────────────────────────────

/// Runs one bulk load against one org.
pub struct BulkJobDriver {
    connection: String,
    query: RestQueryClient,
    bulk: BulkApiClient,
    poll_interval: Duration,
    max_polls: Option<u32>,
    observer: Arc<dyn BulkObserver>,
}

impl BulkJobDriver {
    pub fn new(
        connection: impl Into<String>,
        http: reqwest::Client,
        session: &Session,
        settings: &BulkSettings,
        observer: Arc<dyn BulkObserver>,
    ) -> Result<Self, AppError> {
        let bulk = BulkApiClient::from_session(http.clone(), session)?;
        let query = RestQueryClient::new(SalesforceClient::new(http, session.clone()));

        Ok(Self {
            connection: connection.into(),
            query,
            bulk,
            poll_interval: settings.poll_interval,
            max_polls: settings.max_polls,
            observer,
        })
    }

    /// Drives the load to a terminal state and reports it to the observer.
    pub async fn run(self) -> BulkOutcome {
        let outcome = self.execute().await;
        self.observer.on_complete(&outcome);
        outcome
    }

    async fn execute(&self) -> BulkOutcome {
        let mut outcome = BulkOutcome {
            connection: self.connection.clone(),
            state: DriverState::NotStarted,
            job_id: None,
            batch_id: None,
            polls: 0,
            detail: None,
        };

        self.transition(DriverState::Checking);
        match self.query.query(GUARD_SOQL).await {
            Ok(result) if result.has_records() => {
                return self.finish(outcome, DriverState::Skipped, None);
            }
            Ok(_) => {}
            Err(e) => {
                return self.finish(outcome, DriverState::GuardError, Some(e.to_string()));
            }
        }

        info!(
            "[BULK] {}: no '{}' records found, starting bulk load",
            self.connection, ACCOUNT_NAME_PREFIX
        );

        let job = match self
            .bulk
            .create_job(&CreateJobRequest::csv_insert(BULK_OBJECT))
            .await
        {
            Ok(job) => job,
            Err(e) => {
                return self.finish(outcome, DriverState::SubmissionError, Some(e.to_string()));
            }
        };
        outcome.job_id = Some(job.id.clone());
        self.transition(DriverState::JobCreated);

        let batch = match generate_account_csv() {
            Ok(csv) => self.bulk.create_batch(&job.id, csv).await,
            Err(e) => Err(e),
        };
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                return self.finish(outcome, DriverState::SubmissionError, Some(e.to_string()));
            }
        };
        outcome.batch_id = Some(batch.id.clone());
        self.transition(DriverState::BatchSubmitted);

        self.poll_until_terminal(&job.id, outcome).await
    }

    /// Sleeps, then lists batches, until one is `Completed` or `Failed`.
    async fn poll_until_terminal(&self, job_id: &str, mut outcome: BulkOutcome) -> BulkOutcome {
        self.transition(DriverState::Polling);

        loop {
            if let Some(max) = self.max_polls {
                if outcome.polls >= max {
                    let detail = format!("no terminal batch state after {} polls", max);
                    return self.finish(outcome, DriverState::PollError, Some(detail));
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            outcome.polls += 1;

            let batches = match self.bulk.batch_info_list(job_id).await {
                Ok(batches) => batches,
                Err(e) => {
                    return self.finish(outcome, DriverState::PollError, Some(e.to_string()));
                }
            };

            for batch in &batches {
                self.observer.on_batch_status(&self.connection, batch);
            }

            if let Some(batch) = batches.iter().find(|b| b.state.is_terminal()) {
                let (state, detail) = match batch.state {
                    BatchState::Completed => (DriverState::Completed, None),
                    _ => (DriverState::Failed, batch.state_message.clone()),
                };
                return self.finish(outcome, state, detail);
            }
        }
    }

    fn transition(&self, state: DriverState) {
        self.observer.on_transition(&self.connection, state);
    }

    fn finish(
        &self,
        mut outcome: BulkOutcome,
        state: DriverState,
        detail: Option<String>,
    ) -> BulkOutcome {
        self.transition(state);
        outcome.state = state;
        outcome.detail = detail;
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Launch
// ─────────────────────────────────────────────────────────────────────────────

/// Spawns the bulk load for `settings.target_connection` as a detached task.
///
/// Returns `None` without spawning when the target is not registered, when
/// the driver cannot be built, or when another load holds the scheduler slot.
pub fn spawn_bulk_load(
    registry: &ConnectionRegistry,
    http: reqwest::Client,
    settings: &BulkSettings,
    scheduler: &BulkJobScheduler,
    observer: Arc<dyn BulkObserver>,
) -> Option<JoinHandle<BulkOutcome>> {
    let target = settings.target_connection.as_str();

    let session = match registry.get(target) {
        Ok(session) => session,
        Err(_) => {
            info!(
                "[BULK] Connection '{}' not configured, skipping bulk load",
                target
            );
            return None;
        }
    };

    let Some(permit) = scheduler.try_acquire() else {
        warn!("[BULK] A bulk load is already running, skipping launch");
        return None;
    };

    let driver = match BulkJobDriver::new(target, http, session, settings, observer) {
        Ok(driver) => driver,
        Err(e) => {
            error!("[BULK] Could not prepare bulk load for '{}': {}", target, e);
            return None;
        }
    };

    info!("[BULK] Starting background bulk load for '{}'", target);

    Some(tokio::spawn(async move {
        let _permit = permit;
        driver.run().await
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
