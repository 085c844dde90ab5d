use std::sync::Arc;

use anchor_log::EventSubscription;
use anchor_types::AnchorRecord;
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};
use crate::service::{AnchorResult, AnchorService};

/// Async front for an [`AnchorService`].
///
/// Every call that touches the store runs on tokio's blocking pool as a task
/// of its own: reads wait on shard locks that a commit holds across its
/// durable writes. Dropping the returned future detaches the caller but
/// never interrupts the work, so a record that gets committed always gets
/// its event too.
#[derive(Clone, Debug)]
pub struct AnchorHandle {
    service: Arc<AnchorService>,
}

impl AnchorHandle {
    pub fn new(service: Arc<AnchorService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<AnchorService> {
        &self.service
    }

    pub async fn anchor(
        &self,
        hash: impl Into<Vec<u8>>,
        submitter: impl Into<String>,
    ) -> ServiceResult<AnchorResult> {
        let hash = hash.into();
        let submitter = submitter.into();
        self.run("anchor", move |service| service.anchor(&hash, &submitter))
            .await
    }

    pub async fn is_anchored(&self, hash: impl Into<Vec<u8>>) -> ServiceResult<bool> {
        let hash = hash.into();
        self.run("is_anchored", move |service| service.is_anchored(&hash))
            .await
    }

    pub async fn record(&self, hash: impl Into<Vec<u8>>) -> ServiceResult<Option<AnchorRecord>> {
        let hash = hash.into();
        self.run("record", move |service| service.record(&hash)).await
    }

    pub fn subscribe_from(&self, sequence: u64) -> ServiceResult<EventSubscription> {
        self.service.subscribe_from(sequence)
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> ServiceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&AnchorService) -> ServiceResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "registry task did not complete");
                ServiceError::StorageUnavailable(format!("{operation} task failed: {e}"))
            })?
    }
}

impl From<AnchorService> for AnchorHandle {
    fn from(service: AnchorService) -> Self {
        Self::new(Arc::new(service))
    }
}
