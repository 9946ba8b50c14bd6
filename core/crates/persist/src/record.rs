use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A row as the store drivers see it: field name to JSON value.
pub type RecordData = Map<String, Value>;

/// Primary-key field of every model.
pub const ID: &str = "id";

/// Soft-delete marker. Absent or null means the row is live.
pub const DELETED_AT: &str = "deleted_at";

/// The entity id of a record, when the driver returned one.
#[must_use]
pub fn id_of(record: &RecordData) -> Option<&str> {
	record.get(ID).and_then(Value::as_str)
}

/// Field-equality filter over a model's rows.
///
/// `Value::Null` matches rows where the field is null or absent, which is
/// what the soft-delete scope relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter(pub Map<String, Value>);

impl Filter {
	#[must_use]
	pub fn new() -> Self {
		Self(Map::new())
	}

	#[must_use]
	pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
		self.0.insert(field.into(), value.into());
		self
	}

	/// Sets a predicate, replacing any caller-supplied value for `field`.
	pub fn force(&mut self, field: impl Into<String>, value: impl Into<Value>) {
		self.0.insert(field.into(), value.into());
	}

	#[must_use]
	pub fn matches(&self, record: &RecordData) -> bool {
		self.0.iter().all(|(field, expected)| {
			record
				.get(field)
				.map_or_else(|| expected.is_null(), |actual| actual == expected)
		})
	}
}

#[cfg(test)]
mod tests {
	use serde_json::{json, Value};

	use super::{id_of, Filter, RecordData};

	fn row(value: serde_json::Value) -> RecordData {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected an object"),
		}
	}

	#[test]
	fn null_matches_absent_and_null_fields() {
		let filter = Filter::new().eq("deleted_at", Value::Null);

		assert!(filter.matches(&row(json!({ "id": "a" }))));
		assert!(filter.matches(&row(json!({ "id": "a", "deleted_at": null }))));
		assert!(!filter.matches(&row(json!({ "id": "a", "deleted_at": "2026-01-01T00:00:00Z" }))));
	}

	#[test]
	fn equality_is_strict() {
		let filter = Filter::new().eq("name", "Aurora Fund");

		assert!(filter.matches(&row(json!({ "name": "Aurora Fund" }))));
		assert!(!filter.matches(&row(json!({ "name": "aurora fund" }))));
		assert!(!filter.matches(&row(json!({}))));
	}

	#[test]
	fn force_overrides_a_caller_predicate() {
		let mut filter = Filter::new().eq("deleted_at", "anything");
		filter.force("deleted_at", Value::Null);

		assert!(filter.matches(&row(json!({ "id": "a" }))));
	}

	#[test]
	fn id_of_requires_a_string_id() {
		assert_eq!(id_of(&row(json!({ "id": "a" }))), Some("a"));
		assert_eq!(id_of(&row(json!({ "id": 7 }))), None);
		assert_eq!(id_of(&row(json!({}))), None);
	}
}
