use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
	error::StoreError,
	record::{id_of, Filter, RecordData, ID},
	repository::{Datastore, Repository},
	ModelKind,
};

type Tables = HashMap<ModelKind, BTreeMap<String, RecordData>>;

/// In-memory [`Datastore`] with the same visible semantics as the real
/// drivers. Backs the test suites and administrative tooling.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
	tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// All rows of `model` in primary-key order, unscoped.
	pub async fn dump(&self, model: ModelKind) -> Vec<RecordData> {
		self.tables
			.read()
			.await
			.get(&model)
			.map(|table| table.values().cloned().collect())
			.unwrap_or_default()
	}
}

#[async_trait]
impl Datastore for MemoryStore {
	fn repo(&self, model: ModelKind) -> Option<Arc<dyn Repository>> {
		Some(Arc::new(MemoryRepository {
			model,
			tables: Arc::clone(&self.tables),
		}))
	}

	async fn disconnect(&self) {}
}

struct MemoryRepository {
	model: ModelKind,
	tables: Arc<RwLock<Tables>>,
}

fn merge(existing: &mut RecordData, data: RecordData) {
	for (field, value) in data {
		existing.insert(field, value);
	}
}

fn with_id(mut data: RecordData) -> (String, RecordData) {
	match id_of(&data) {
		Some(id) => (id.to_string(), data),
		None => {
			let id = Uuid::new_v4().to_string();
			data.insert(ID.to_string(), Value::String(id.clone()));
			(id, data)
		}
	}
}

#[async_trait]
impl Repository for MemoryRepository {
	fn model(&self) -> ModelKind {
		self.model
	}

	async fn create(&self, data: RecordData) -> Result<RecordData, StoreError> {
		let (id, data) = with_id(data);
		let mut tables = self.tables.write().await;
		let table = tables.entry(self.model).or_default();

		if table.contains_key(&id) {
			return Err(StoreError::Constraint(format!(
				"duplicate id <model='{}', id='{id}'>",
				self.model
			)));
		}

		table.insert(id, data.clone());
		Ok(data)
	}

	async fn create_many(&self, rows: Vec<RecordData>) -> Result<u64, StoreError> {
		let mut tables = self.tables.write().await;
		let table = tables.entry(self.model).or_default();
		let mut written = 0u64;

		for row in rows {
			let (id, row) = with_id(row);
			if table.contains_key(&id) {
				return Err(StoreError::Constraint(format!(
					"duplicate id <model='{}', id='{id}'>",
					self.model
				)));
			}
			table.insert(id, row);
			written += 1;
		}

		Ok(written)
	}

	async fn update(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		let mut tables = self.tables.write().await;
		let row = tables
			.entry(self.model)
			.or_default()
			.get_mut(id)
			.ok_or(StoreError::NotFound {
				model: self.model,
				operation: "update",
			})?;

		merge(row, data);
		Ok(row.clone())
	}

	async fn update_many(&self, filter: Filter, data: RecordData) -> Result<u64, StoreError> {
		let mut tables = self.tables.write().await;
		let mut touched = 0u64;

		for row in tables.entry(self.model).or_default().values_mut() {
			if filter.matches(row) {
				merge(row, data.clone());
				touched += 1;
			}
		}

		Ok(touched)
	}

	async fn upsert(&self, id: &str, data: RecordData) -> Result<RecordData, StoreError> {
		let mut tables = self.tables.write().await;
		let table = tables.entry(self.model).or_default();

		if let Some(row) = table.get_mut(id) {
			merge(row, data);
			return Ok(row.clone());
		}

		let mut row = data;
		row.insert(ID.to_string(), Value::String(id.to_string()));
		table.insert(id.to_string(), row.clone());
		Ok(row)
	}

	async fn delete(&self, id: &str) -> Result<RecordData, StoreError> {
		self.tables
			.write()
			.await
			.entry(self.model)
			.or_default()
			.remove(id)
			.ok_or(StoreError::NotFound {
				model: self.model,
				operation: "delete",
			})
	}

	async fn delete_many(&self, filter: Filter) -> Result<u64, StoreError> {
		let mut tables = self.tables.write().await;
		let table = tables.entry(self.model).or_default();
		let doomed: Vec<String> = table
			.iter()
			.filter(|(_, row)| filter.matches(row))
			.map(|(id, _)| id.clone())
			.collect();

		for id in &doomed {
			table.remove(id);
		}

		Ok(doomed.len() as u64)
	}

	async fn find_unique(&self, id: &str) -> Result<Option<RecordData>, StoreError> {
		Ok(self
			.tables
			.read()
			.await
			.get(&self.model)
			.and_then(|table| table.get(id))
			.cloned())
	}

	async fn find_unique_or_throw(&self, id: &str) -> Result<RecordData, StoreError> {
		self.find_unique(id).await?.ok_or(StoreError::NotFound {
			model: self.model,
			operation: "find_unique_or_throw",
		})
	}

	async fn find_many(&self, filter: Filter) -> Result<Vec<RecordData>, StoreError> {
		Ok(self
			.tables
			.read()
			.await
			.get(&self.model)
			.map(|table| {
				table
					.values()
					.filter(|row| filter.matches(row))
					.cloned()
					.collect()
			})
			.unwrap_or_default())
	}

	async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
		Ok(self.find_many(filter).await?.len() as u64)
	}

	async fn aggregate(
		&self,
		filter: Filter,
		by: Vec<String>,
	) -> Result<Vec<RecordData>, StoreError> {
		let rows = self.find_many(filter).await?;

		if by.is_empty() {
			let mut total = RecordData::new();
			total.insert("_count".to_string(), Value::from(rows.len() as u64));
			return Ok(vec![total]);
		}

		// group key -> (group fields, row count), ordered for determinism
		let mut groups: BTreeMap<String, (RecordData, u64)> = BTreeMap::new();

		for row in rows {
			let mut group = RecordData::new();
			for field in &by {
				group.insert(
					field.clone(),
					row.get(field).cloned().unwrap_or(Value::Null),
				);
			}

			let key = serde_json::to_string(&group)
				.map_err(|e| StoreError::Other(e.to_string()))?;
			groups.entry(key).or_insert((group, 0)).1 += 1;
		}

		Ok(groups
			.into_values()
			.map(|(mut group, count)| {
				group.insert("_count".to_string(), Value::from(count));
				group
			})
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use serde_json::{json, Value};

	use super::MemoryStore;
	use crate::{Datastore, Filter, ModelKind, RecordData, StoreError};

	fn row(value: serde_json::Value) -> RecordData {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected an object"),
		}
	}

	#[tokio::test]
	async fn create_generates_an_id_when_missing() {
		let store = MemoryStore::new();
		let repo = store.repo(ModelKind::Contact).unwrap();

		let created = repo.create(row(json!({ "name": "Ada" }))).await.unwrap();
		assert!(created.get("id").and_then(Value::as_str).is_some());
	}

	#[tokio::test]
	async fn duplicate_ids_violate_a_constraint() {
		let store = MemoryStore::new();
		let repo = store.repo(ModelKind::Contact).unwrap();

		repo.create(row(json!({ "id": "c1" }))).await.unwrap();
		assert!(matches!(
			repo.create(row(json!({ "id": "c1" }))).await,
			Err(StoreError::Constraint(_))
		));
	}

	#[tokio::test]
	async fn update_merges_fields() {
		let store = MemoryStore::new();
		let repo = store.repo(ModelKind::Contact).unwrap();

		repo.create(row(json!({ "id": "c1", "name": "Ada", "firm": "Aurora" })))
			.await
			.unwrap();
		let updated = repo
			.update("c1", row(json!({ "name": "Ada L." })))
			.await
			.unwrap();

		assert_eq!(updated["name"], json!("Ada L."));
		assert_eq!(updated["firm"], json!("Aurora"));
	}

	#[tokio::test]
	async fn aggregate_groups_and_counts() {
		let store = MemoryStore::new();
		let repo = store.repo(ModelKind::Deal).unwrap();

		repo.create_many(vec![
			row(json!({ "id": "d1", "stage": "open" })),
			row(json!({ "id": "d2", "stage": "open" })),
			row(json!({ "id": "d3", "stage": "won" })),
		])
		.await
		.unwrap();

		let groups = repo
			.aggregate(Filter::new(), vec!["stage".to_string()])
			.await
			.unwrap();
		assert_eq!(groups.len(), 2);

		let open = groups
			.iter()
			.find(|g| g["stage"] == json!("open"))
			.unwrap();
		assert_eq!(open["_count"], json!(2));

		let totals = repo.aggregate(Filter::new(), vec![]).await.unwrap();
		assert_eq!(totals[0]["_count"], json!(3));
	}
}
