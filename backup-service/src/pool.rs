//! Bounded pool running the blocking collaborator calls of in-flight RPCs.

use crate::error::ServiceError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const DEFAULT_MAX_WORKERS: usize = 10;

#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Waits for a free worker, then runs `job` on the blocking thread pool.
    ///
    /// The permit travels with the job, so a worker stays occupied until the
    /// job returns even if the caller stops waiting for it.
    pub async fn run<F, T>(&self, job: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::Pool("worker pool is shut down".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ServiceError::Pool(format!("worker failed: {e}")))
    }

    /// Stops admitting jobs and waits up to `grace` for running ones.
    /// Returns whether the pool went idle in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let all = self.capacity as u32;
        let idle = matches!(
            tokio::time::timeout(grace, self.permits.acquire_many(all)).await,
            Ok(Ok(_))
        );
        self.permits.close();
        idle
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}
