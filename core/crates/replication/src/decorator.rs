//! Write-through hook feeding the replication queue.

use std::sync::Arc;

use async_trait::async_trait;
use ih_core_persist::{id_of, Filter, ModelKind, RecordData, Repository, StoreError};
use tracing::{debug, warn};

use crate::{ReplicationScheduler, TaskArgs};

/// Decorator mirroring every successful mutation on one model into the
/// replication queue. Reads pass through untouched, and nothing enqueued
/// here can fail or delay the primary call.
pub struct ReplicatedRepository {
	inner: Arc<dyn Repository>,
	scheduler: ReplicationScheduler,
}

impl ReplicatedRepository {
	#[must_use]
	pub fn new(inner: Arc<dyn Repository>, scheduler: ReplicationScheduler) -> Self {
		Self { inner, scheduler }
	}

	/// Mirrors a server-returned row as an idempotent upsert.
	fn mirror_row(&self, row: &RecordData) {
		match id_of(row) {
			Some(id) => self.scheduler.enqueue(
				self.inner.model(),
				TaskArgs::Upsert {
					id: id.to_string(),
					data: row.clone(),
				},
			),
			None => warn!(
				"primary returned a row without an id, cannot replicate <model='{}'>",
				self.inner.model()
			),
		}
	}
}

#[async_trait]
impl Repository for ReplicatedRepository {
	fn model(&self) -> ModelKind {
		self.inner.model()
	}

	async fn create(&self, data: RecordData) -> Result<RecordData, StoreError> {
		let created = self.inner.create(data).await?;
		self.mirror_row(&created);
		Ok(created)
	}

	async fn create_many(&self, rows: Vec<RecordData>) -> Result<u64, StoreError> {
		let written = self.inner.create_many(rows.clone()).await?;

		// drivers do not return rows for bulk creates; only inputs that
		// carry an explicit id can be mirrored
		let mut skipped = 0usize;
		for row in rows {
			if let Some(id) = id_of(&row) {
				let id = id.to_string();
				self.scheduler
					.enqueue(self.inner.model(), TaskArgs::Upsert { id, data: row });
			} else {
				skipped += 1;
			}
		}

		if skipped > 0 {
			debug!(
				"{skipped} bulk-created rows rely on server-generated ids and were not replicated <model='{}'>",
				self.inner.model()
			);
		}

		Ok(written)
	}

	async fn update(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		let updated = self.inner.update(id, data).await?;
		self.mirror_row(&updated);
		Ok(updated)
	}

	async fn update_many(&self, filter: Filter, data: RecordData) -> Result<u64, StoreError> {
		let touched = self
			.inner
			.update_many(filter.clone(), data.clone())
			.await?;
		self.scheduler
			.enqueue(self.inner.model(), TaskArgs::UpdateMany { filter, data });
		Ok(touched)
	}

	async fn upsert(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		let row = self.inner.upsert(id, data).await?;
		self.mirror_row(&row);
		Ok(row)
	}

	async fn delete(&self, id: &str) -> Result<RecordData, StoreError> {
		let deleted = self.inner.delete(id).await?;
		self.scheduler.enqueue(
			self.inner.model(),
			TaskArgs::Delete { id: id.to_string() },
		);
		Ok(deleted)
	}

	async fn delete_many(&self, filter: Filter) -> Result<u64, StoreError> {
		let removed = self.inner.delete_many(filter.clone()).await?;
		self.scheduler
			.enqueue(self.inner.model(), TaskArgs::DeleteMany { filter });
		Ok(removed)
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
