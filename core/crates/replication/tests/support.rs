use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
};

use async_trait::async_trait;
use ih_core_persist::{
	Datastore, Filter, MemoryStore, ModelKind, RecordData, Repository, StoreError,
};
use serde_json::Value;

/// Scripted secondary store: each write attempt consumes the next entry of
/// the failure script (`true` = fail with a transient driver error) and
/// successful upserts are logged in apply order.
#[derive(Clone)]
pub struct FlakyStore {
	pub inner: MemoryStore,
	script: Arc<Mutex<VecDeque<bool>>>,
	attempts: Arc<AtomicUsize>,
	applied: Arc<Mutex<Vec<String>>>,
}

impl FlakyStore {
	pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
		Self {
			inner: MemoryStore::new(),
			script: Arc::new(Mutex::new(script.into_iter().collect())),
			attempts: Arc::new(AtomicUsize::new(0)),
			applied: Arc::new(Mutex::new(Vec::new())),
		}
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}

	pub fn applied(&self) -> Vec<String> {
		self.applied.lock().unwrap().clone()
	}

	fn next_attempt_fails(&self) -> bool {
		self.attempts.fetch_add(1, Ordering::SeqCst);
		self.script.lock().unwrap().pop_front().unwrap_or(false)
	}

	fn log_applied(&self, data: &RecordData, id: &str) {
		let label = data
			.get("rev")
			.and_then(Value::as_str)
			.unwrap_or(id)
			.to_string();
		self.applied.lock().unwrap().push(label);
	}
}

#[async_trait]
impl Datastore for FlakyStore {
	fn repo(&self, model: ModelKind) -> Option<Arc<dyn Repository>> {
		Some(Arc::new(FlakyRepository {
			store: self.clone(),
			inner: self.inner.repo(model)?,
		}))
	}

	async fn disconnect(&self) {}
}

struct FlakyRepository {
	store: FlakyStore,
	inner: Arc<dyn Repository>,
}

#[async_trait]
impl Repository for FlakyRepository {
	fn model(&self) -> ModelKind {
		self.inner.model()
	}

	async fn create(&self, data: RecordData) -> Result<RecordData, StoreError> {
		self.inner.create(data).await
	}

	async fn create_many(&self, rows: Vec<RecordData>) -> Result<u64, StoreError> {
		self.inner.create_many(rows).await
	}

	async fn update(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		self.inner.update(id, data).await
	}

	async fn update_many(&self, filter: Filter, data: RecordData) -> Result<u64, StoreError> {
		self.inner.update_many(filter, data).await
	}

	async fn upsert(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		if self.store.next_attempt_fails() {
			return Err(StoreError::classify("connection reset by peer"));
		}

		let row = self.inner.upsert(id, data).await?;
		self.store.log_applied(&row, id);
		Ok(row)
	}

	async fn delete(&self, id: &str) -> Result<RecordData, StoreError> {
		if self.store.next_attempt_fails() {
			return Err(StoreError::classify("connection reset by peer"));
		}

		self.inner.delete(id).await
	}

	async fn delete_many(&self, filter: Filter) -> Result<u64, StoreError> {
		self.inner.delete_many(filter).await
	}

	async fn find_unique(&self, id: &str) -> Result<Option<RecordData>, StoreError> {
		self.inner.find_unique(id).await
	}

	async fn find_unique_or_throw(&self, id: &str) -> Result<RecordData, StoreError> {
		self.inner.find_unique_or_throw(id).await
	}

	async fn find_many(&self, filter: Filter) -> Result<Vec<RecordData>, StoreError> {
		self.inner.find_many(filter).await
	}

	async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
		self.inner.count(filter).await
	}

	async fn aggregate(
		&self,
		filter: Filter,
		by: Vec<String>,
	) -> Result<Vec<RecordData>, StoreError> {
		self.inner.aggregate(filter, by).await
	}
}
