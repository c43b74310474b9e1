//! Single-flight guard for background bulk loads.
//!
//! A load holds a `BulkJobPermit` for its whole run; a second launch while
//! the slot is taken is refused instead of queued.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Keeps at most one bulk load running. Clones share the slot.
#[derive(Clone)]
pub struct BulkJobScheduler {
    sem: Arc<Semaphore>,
}

impl BulkJobScheduler {
    pub fn single() -> Self {
        Self {
            sem: Arc::new(Semaphore::new(1)),
        }
    }

    /// Takes the slot without waiting. `None` while another load holds it.
    pub fn try_acquire(&self) -> Option<BulkJobPermit> {
        self.sem
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| BulkJobPermit { _permit: permit })
    }
}

/// The occupied slot. Released on drop.
pub struct BulkJobPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let scheduler = BulkJobScheduler::single();

        let first = scheduler.try_acquire();
        assert!(first.is_some());
        assert!(scheduler.try_acquire().is_none());

        drop(first);

        assert!(scheduler.try_acquire().is_some());
    }

    #[test]
    fn clones_share_the_slot() {
        let scheduler = BulkJobScheduler::single();
        let other = scheduler.clone();

        let _held = scheduler.try_acquire().unwrap();

        assert!(other.try_acquire().is_none());
    }

    #[tokio::test]
    async fn permit_moved_into_task_releases_on_completion() {
        let scheduler = BulkJobScheduler::single();
        let permit = scheduler.try_acquire().unwrap();

        tokio::spawn(async move {
            let _permit = permit;
        })
        .await
        .unwrap();

        assert!(scheduler.try_acquire().is_some());
    }
}
