//! Background bulk load of sample accounts.
//!
//! - `payload` builds the CSV batch
//! - `driver` runs guard, job, batch and polling steps
//! - `scheduler` keeps at most one load in flight

pub mod driver;
pub mod payload;
pub mod scheduler;

pub use driver::{
    spawn_bulk_load, BulkJobDriver, BulkObserver, BulkOutcome, DriverState, TracingObserver,
};
pub use scheduler::{BulkJobPermit, BulkJobScheduler};
