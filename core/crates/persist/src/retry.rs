use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use crate::{
	error::StoreError,
	record::{Filter, RecordData},
	repository::{Datastore, Repository},
	ModelKind,
};

/// Delay before each transient-error retry against the primary store.
/// Independent of the replication queue's own retry schedule.
const RETRY_DELAYS: [Duration; 2] = [Duration::from_millis(50), Duration::from_millis(250)];

/// Retries `f` on [`StoreError::Transient`] per [`RETRY_DELAYS`]. Any
/// other error propagates unchanged, as does a transient one once the
/// budget is spent.
pub async fn with_retries<T, F, Fut>(operation: &str, mut f: F) -> Result<T, StoreError>
where
	F: FnMut() -> Fut + Send,
	Fut: Future<Output = Result<T, StoreError>> + Send,
{
	let mut attempt = 0;

	loop {
		match f().await {
			Err(e) if e.is_transient() && attempt < RETRY_DELAYS.len() => {
				warn!("transient store error on {operation}, will retry: {e}");
				sleep(RETRY_DELAYS[attempt]).await;
				attempt += 1;
			}
			other => return other,
		}
	}
}

/// Primary-client wrapper applying [`with_retries`] to every operation.
pub struct RetryingStore {
	inner: Arc<dyn Datastore>,
}

impl RetryingStore {
	#[must_use]
	pub fn new(inner: Arc<dyn Datastore>) -> Self {
		Self { inner }
	}
}

#[async_trait]
impl Datastore for RetryingStore {
	fn repo(&self, model: ModelKind) -> Option<Arc<dyn Repository>> {
		self.inner
			.repo(model)
			.map(|inner| Arc::new(RetryingRepository { inner }) as Arc<dyn Repository>)
	}

	async fn disconnect(&self) {
		self.inner.disconnect().await;
	}
}

struct RetryingRepository {
	inner: Arc<dyn Repository>,
}

#[async_trait]
impl Repository for RetryingRepository {
	fn model(&self) -> ModelKind {
		self.inner.model()
	}

	async fn create(&self, data: RecordData) -> Result<RecordData, StoreError> {
		with_retries("create", || self.inner.create(data.clone())).await
	}

	async fn create_many(&self, rows: Vec<RecordData>) -> Result<u64, StoreError> {
		with_retries("create_many", || self.inner.create_many(rows.clone())).await
	}

	async fn update(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		with_retries("update", || self.inner.update(id, data.clone())).await
	}

	async fn update_many(&self, filter: Filter, data: RecordData) -> Result<u64, StoreError> {
		with_retries("update_many", || {
			self.inner.update_many(filter.clone(), data.clone())
		})
		.await
	}

	async fn upsert(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		with_retries("upsert", || self.inner.upsert(id, data.clone())).await
	}

	async fn delete(&self, id: &str) -> Result<RecordData, StoreError> {
		with_retries("delete", || self.inner.delete(id)).await
	}

	async fn delete_many(&self, filter: Filter) -> Result<u64, StoreError> {
		with_retries("delete_many", || self.inner.delete_many(filter.clone())).await
	}

	async fn find_unique(&self, id: &str) -> Result<Option<RecordData>, StoreError> {
		with_retries("find_unique", || self.inner.find_unique(id)).await
	}

	async fn find_unique_or_throw(&self, id: &str) -> Result<RecordData, StoreError> {
		with_retries("find_unique_or_throw", || self.inner.find_unique_or_throw(id)).await
	}

	async fn find_many(&self, filter: Filter) -> Result<Vec<RecordData>, StoreError> {
		with_retries("find_many", || self.inner.find_many(filter.clone())).await
	}

	async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
		with_retries("count", || self.inner.count(filter.clone())).await
	}

	async fn aggregate(
		&self,
		filter: Filter,
		by: Vec<String>,
	) -> Result<Vec<RecordData>, StoreError> {
		with_retries("aggregate", || {
			self.inner.aggregate(filter.clone(), by.clone())
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::with_retries;
	use crate::StoreError;

	#[tokio::test]
	async fn transient_errors_are_retried() {
		let calls = AtomicUsize::new(0);

		let out = with_retries("test", || async {
			if calls.fetch_add(1, Ordering::SeqCst) == 0 {
				Err(StoreError::Transient("connection reset by peer".into()))
			} else {
				Ok(7)
			}
		})
		.await;

		assert_eq!(out.unwrap(), 7);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn other_errors_propagate_immediately() {
		let calls = AtomicUsize::new(0);

		let out: Result<(), _> = with_retries("test", || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(StoreError::Constraint("duplicate id".into()))
		})
		.await;

		assert!(matches!(out, Err(StoreError::Constraint(_))));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn the_retry_budget_is_bounded() {
		let calls = AtomicUsize::new(0);

		let out: Result<(), _> = with_retries("test", || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(StoreError::Transient("timed out".into()))
		})
		.await;

		assert!(matches!(out, Err(StoreError::Transient(_))));
		// first attempt plus one retry per delay slot
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}
}
