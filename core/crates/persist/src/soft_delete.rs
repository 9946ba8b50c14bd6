//! Logical-deletion interception.
//!
//! For allow-listed models, deletes become `deleted_at` updates and reads
//! are scoped so marked rows stay invisible through the standard surface.
//! Administrative tooling and the audit layer use the raw datastore, which
//! bypasses all of this. No audit side effects originate here; composition
//! with the audit layer is fixed at startup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::{
	error::StoreError,
	record::{Filter, RecordData, DELETED_AT},
	repository::Repository,
	ModelKind,
};

/// Decorator making logical deletion transparent for one model.
pub struct ScopedRepository {
	inner: Arc<dyn Repository>,
}

impl ScopedRepository {
	#[must_use]
	pub fn new(inner: Arc<dyn Repository>) -> Self {
		Self { inner }
	}

	/// Injects `deleted_at = null` into a multi-row filter. The predicate
	/// replaces any caller-supplied value; callers cannot opt out through
	/// this surface.
	fn scope(mut filter: Filter) -> Filter {
		filter.force(DELETED_AT, Value::Null);
		filter
	}

	fn tombstone() -> RecordData {
		let mut data = RecordData::new();
		data.insert(
			DELETED_AT.to_string(),
			Value::String(Utc::now().to_rfc3339()),
		);
		data
	}

	fn is_deleted(record: &RecordData) -> bool {
		record.get(DELETED_AT).is_some_and(|value| !value.is_null())
	}
}

#[async_trait]
impl Repository for ScopedRepository {
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
		self.inner.upsert(id, data).await
	}

	async fn delete(&self, id: &str) -> Result<RecordData, StoreError> {
		self.inner.update(id, Self::tombstone()).await
	}

	async fn delete_many(&self, filter: Filter) -> Result<u64, StoreError> {
		self.inner.update_many(filter, Self::tombstone()).await
	}

	async fn find_unique(&self, id: &str) -> Result<Option<RecordData>, StoreError> {
		// the key lookup itself is not rewritten; a logically deleted row
		// simply behaves as not found
		Ok(self
			.inner
			.find_unique(id)
			.await?
			.filter(|record| !Self::is_deleted(record)))
	}

	async fn find_unique_or_throw(&self, id: &str) -> Result<RecordData, StoreError> {
		let record = self.inner.find_unique_or_throw(id).await?;

		if Self::is_deleted(&record) {
			return Err(StoreError::NotFound {
				model: self.model(),
				operation: "find_unique_or_throw",
			});
		}

		Ok(record)
	}

	async fn find_many(&self, filter: Filter) -> Result<Vec<RecordData>, StoreError> {
		self.inner.find_many(Self::scope(filter)).await
	}

	async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
		self.inner.count(Self::scope(filter)).await
	}

	async fn aggregate(
		&self,
		filter: Filter,
		by: Vec<String>,
	) -> Result<Vec<RecordData>, StoreError> {
		self.inner.aggregate(Self::scope(filter), by).await
	}
}
