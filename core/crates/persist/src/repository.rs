use std::sync::Arc;

use async_trait::async_trait;

use crate::{
	error::StoreError,
	record::{Filter, RecordData},
	ModelKind,
};

/// Uniform mutation/query surface over one model.
///
/// This is the seam the interception layers wrap: soft delete, audit
/// capture and replication each implement it around an inner
/// implementation, composed in a fixed order at startup.
#[async_trait]
pub trait Repository: Send + Sync {
	fn model(&self) -> ModelKind;

	async fn create(&self, data: RecordData) -> Result<RecordData, StoreError>;

	/// Returns the number of rows written. Drivers do not return the
	/// created rows for bulk writes.
	async fn create_many(&self, rows: Vec<RecordData>) -> Result<u64, StoreError>;

	async fn update(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError>;

	async fn update_many(&self, filter: Filter, data: RecordData) -> Result<u64, StoreError>;

	async fn upsert(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError>;

	async fn delete(&self, id: &str) -> Result<RecordData, StoreError>;

	async fn delete_many(&self, filter: Filter) -> Result<u64, StoreError>;

	async fn find_unique(&self, id: &str) -> Result<Option<RecordData>, StoreError>;

	async fn find_unique_or_throw(&self, id: &str) -> Result<RecordData, StoreError>;

	async fn find_many(&self, filter: Filter) -> Result<Vec<RecordData>, StoreError>;

	async fn count(&self, filter: Filter) -> Result<u64, StoreError>;

	/// Grouped row counts over the fields in `by`; an empty list yields a
	/// single `_count` row.
	async fn aggregate(
		&self,
		filter: Filter,
		by: Vec<String>,
	) -> Result<Vec<RecordData>, StoreError>;
}

/// A connected store: a registry of per-model repositories.
#[async_trait]
pub trait Datastore: Send + Sync {
	/// `None` when the store has no accessor for `model`.
	fn repo(&self, model: ModelKind) -> Option<Arc<dyn Repository>>;

	/// Tears down the underlying connection. Idempotent.
	async fn disconnect(&self);
}
