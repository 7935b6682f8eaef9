use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};

use crate::container::ContainerError;

/// Bounded pool for container runtime calls
///
/// Every call acquires a permit and runs on its own tokio task, so no more
/// than `capacity` runtime calls are in flight across all requests; excess
/// calls queue for a slot.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Run `call` on a pool slot and wait for its result.
    ///
    /// The permit is held by the spawned task, so the slot stays occupied
    /// until the call finishes even if the caller stops waiting.
    #[instrument(skip_all)]
    pub async fn dispatch<F, T>(&self, call: F) -> Result<T, ContainerError>
    where
        F: Future<Output = Result<T, ContainerError>> + Send + 'static,
        T: Send + 'static,
    {
        self.acquire().await?.run(call).await
    }

    /// Wait for a free slot.
    ///
    /// Callers that put a deadline on a runtime call acquire first, so time
    /// spent queued does not count against the deadline.
    pub async fn acquire(&self) -> Result<PoolSlot, ContainerError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ContainerError::PoolClosed)?;
        Ok(PoolSlot { permit })
    }

    /// Get the number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get the total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// An acquired pool slot, released when its call finishes
#[derive(Debug)]
pub struct PoolSlot {
    permit: OwnedSemaphorePermit,
}

impl PoolSlot {
    /// Run `call` on its own task holding this slot and wait for its result.
    ///
    /// The slot stays occupied until the call finishes even if the caller
    /// stops waiting.
    pub async fn run<F, T>(self, call: F) -> Result<T, ContainerError>
    where
        F: Future<Output = Result<T, ContainerError>> + Send + 'static,
        T: Send + 'static,
    {
        debug!("dispatching runtime call");
        let permit = self.permit;
        let task = tokio::spawn(async move {
            let _permit = permit;
            call.await
        });

        task.await
            .map_err(|e| ContainerError::TaskFailed(e.to_string()))?
    }
}
