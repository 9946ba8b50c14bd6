//! Mutation wrapper producing the audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use ih_context as context;
use ih_core_persist::{
	id_of, Datastore, Filter, ModelKind, RecordData, Repository, StoreError,
};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::{
	changes::{compute_changes, sanitize_snapshot},
	AuditAction, AuditEntry,
};

/// Decorator recording create/update/upsert/delete mutations on one
/// audited model.
///
/// Pre-mutation state is fetched through the raw datastore so the lookup
/// never re-enters the interception chain, and entries are persisted the
/// same way.
pub struct AuditedRepository {
	inner: Arc<dyn Repository>,
	raw: Arc<dyn Datastore>,
}

impl AuditedRepository {
	#[must_use]
	pub fn new(inner: Arc<dyn Repository>, raw: Arc<dyn Datastore>) -> Self {
		Self { inner, raw }
	}

	/// Current row by id through the raw path, for old-state snapshots.
	/// Failures degrade to `None`; they never affect the mutation.
	async fn fetch_old(&self, id: &str) -> Option<RecordData> {
		let repo = self.raw.repo(self.inner.model())?;

		match repo.find_unique(id).await {
			Ok(row) => row,
			Err(e) => {
				warn!(
					"failed to fetch prior state for audit <model='{}', id='{id}'>: {e}",
					self.inner.model()
				);
				None
			}
		}
	}

	/// Builds and persists the entry on a detached task. Skips entirely
	/// when no actor identity is in scope.
	fn record(
		&self,
		action: AuditAction,
		resource_id: String,
		changes: Option<Map<String, Value>>,
		snapshot: Option<RecordData>,
	) {
		let actor = context::current();
		let model = self.inner.model();

		if actor.is_anonymous() {
			debug!("skipping audit entry for anonymous mutation <model='{model}', action='{action}'>");
			return;
		}

		let Some(log) = self.raw.repo(ModelKind::AuditLog) else {
			error!("audit log accessor missing on primary store");
			return;
		};

		tokio::spawn(async move {
			let entry = AuditEntry::build(action, model, &resource_id, &actor, changes, snapshot);

			let write = async {
				let record = entry
					.to_record()
					.map_err(|e| StoreError::Other(e.to_string()))?;
				log.create(record).await
			};

			if let Err(e) = write.await {
				error!(
					"failed to persist audit entry <model='{model}', action='{action}', resource_id='{resource_id}'>: {e}"
				);
			}
		});
	}
}

#[async_trait]
impl Repository for AuditedRepository {
	fn model(&self) -> ModelKind {
		self.inner.model()
	}

	async fn create(&self, data: RecordData) -> Result<RecordData, StoreError> {
		let created = self.inner.create(data).await?;

		if let Some(id) = id_of(&created) {
			self.record(AuditAction::Create, id.to_string(), None, None);
		}

		Ok(created)
	}

	async fn create_many(&self, rows: Vec<RecordData>) -> Result<u64, StoreError> {
		self.inner.create_many(rows).await
	}

	async fn update(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		let old = self.fetch_old(id).await;
		let updated = self.inner.update(id, data).await?;

		let changes = compute_changes(old.as_ref(), Some(&updated));
		self.record(AuditAction::Update, id.to_string(), changes, None);

		Ok(updated)
	}

	async fn update_many(&self, filter: Filter, data: RecordData) -> Result<u64, StoreError> {
		self.inner.update_many(filter, data).await
	}

	async fn upsert(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		let old = self.fetch_old(id).await;
		let row = self.inner.upsert(id, data).await?;

		// an upsert that found nothing to update is a create
		if old.is_some() {
			let changes = compute_changes(old.as_ref(), Some(&row));
			self.record(AuditAction::Update, id.to_string(), changes, None);
		} else {
			self.record(AuditAction::Create, id.to_string(), None, None);
		}

		Ok(row)
	}

	async fn delete(&self, id: &str) -> Result<RecordData, StoreError> {
		let old = self.fetch_old(id).await;
		let deleted = self.inner.delete(id).await?;

		let snapshot = sanitize_snapshot(old.as_ref().unwrap_or(&deleted));
		self.record(AuditAction::Delete, id.to_string(), None, Some(snapshot));

		Ok(deleted)
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

/// Latest entries for one resource, newest first. This is the read
/// surface the compliance UI consumes.
pub async fn recent_for_resource(
	store: &Arc<dyn Datastore>,
	model: ModelKind,
	resource_id: &str,
	limit: usize,
) -> Result<Vec<AuditEntry>, StoreError> {
	let Some(log) = store.repo(ModelKind::AuditLog) else {
		return Ok(Vec::new());
	};

	let rows = log
		.find_many(
			Filter::new()
				.eq("resource_type", model.to_string())
				.eq("resource_id", resource_id),
		)
		.await?;

	let mut entries: Vec<AuditEntry> = rows
		.into_iter()
		.filter_map(|record| serde_json::from_value(Value::Object(record)).ok())
		.collect();

	entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
	entries.truncate(limit);

	Ok(entries)
}
