//! Field-level diffing and snapshot redaction.

use std::collections::BTreeSet;

use ih_core_persist::RecordData;
use serde_json::{json, Map, Value};

/// Volatile or sensitive fields omitted from diffs even when they changed.
pub const DIFF_DENYLIST: &[&str] = &[
	"created_at",
	"updated_at",
	"password",
	"secret",
	"token",
	"api_key",
	"encryption_key",
];

/// Fields whose values are blanked out of delete snapshots.
const REDACTED_FIELDS: &[&str] = &[
	"password",
	"secret",
	"token",
	"api_key",
	"encryption_key",
];

const REDACTED: &str = "[REDACTED]";

/// Field-by-field diff of two row snapshots, as `field -> {from, to}`.
///
/// Returns `None` when either side is missing. Denylisted fields are
/// omitted even when they differ; fields absent on one side diff against
/// null.
#[must_use]
pub fn compute_changes(
	old: Option<&RecordData>,
	new: Option<&RecordData>,
) -> Option<Map<String, Value>> {
	let (old, new) = (old?, new?);

	let fields: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
	let mut changes = Map::new();

	for field in fields {
		if DIFF_DENYLIST.contains(&field.as_str()) {
			continue;
		}

		let from = old.get(field).cloned().unwrap_or(Value::Null);
		let to = new.get(field).cloned().unwrap_or(Value::Null);

		if from != to {
			changes.insert(field.clone(), json!({ "from": from, "to": to }));
		}
	}

	Some(changes)
}

/// A copy of `record` safe to keep on the audit trail: sensitive fields
/// are replaced with a marker, everything else is carried verbatim.
#[must_use]
pub fn sanitize_snapshot(record: &RecordData) -> RecordData {
	record
		.iter()
		.map(|(field, value)| {
			if REDACTED_FIELDS.contains(&field.as_str()) && !value.is_null() {
				(field.clone(), Value::String(REDACTED.to_string()))
			} else {
				(field.clone(), value.clone())
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use serde_json::{json, Value};

	use super::{compute_changes, sanitize_snapshot};
	use ih_core_persist::RecordData;

	fn row(value: serde_json::Value) -> RecordData {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected an object"),
		}
	}

	#[test]
	fn missing_inputs_yield_no_diff() {
		let record = row(json!({ "id": "a" }));

		assert!(compute_changes(None, Some(&record)).is_none());
		assert!(compute_changes(Some(&record), None).is_none());
		assert!(compute_changes(None, None).is_none());
	}

	#[test]
	fn only_differing_fields_are_reported() {
		let old = row(json!({ "id": "a", "name": "Alpha", "stage": "open" }));
		let new = row(json!({ "id": "a", "name": "Beta", "stage": "open" }));

		let changes = compute_changes(Some(&old), Some(&new)).unwrap();
		assert_eq!(changes.len(), 1);
		assert_eq!(changes["name"], json!({ "from": "Alpha", "to": "Beta" }));
	}

	#[test]
	fn denylisted_fields_are_omitted_even_when_changed() {
		let old = row(json!({ "name": "x", "password": "a", "updated_at": "t0" }));
		let new = row(json!({ "name": "x", "password": "b", "updated_at": "t1" }));

		let changes = compute_changes(Some(&old), Some(&new)).unwrap();
		assert!(changes.is_empty());
	}

	#[test]
	fn fields_absent_on_one_side_diff_against_null() {
		let old = row(json!({ "id": "a" }));
		let new = row(json!({ "id": "a", "deleted_at": "2026-01-01T00:00:00Z" }));

		let changes = compute_changes(Some(&old), Some(&new)).unwrap();
		assert_eq!(
			changes["deleted_at"],
			json!({ "from": null, "to": "2026-01-01T00:00:00Z" })
		);
	}

	#[test]
	fn snapshots_redact_sensitive_fields() {
		let record = row(json!({
			"id": "u1",
			"email": "ada@example.com",
			"password": "hunter2",
			"api_key": null,
		}));

		let snapshot = sanitize_snapshot(&record);
		assert_eq!(snapshot["password"], json!("[REDACTED]"));
		assert_eq!(snapshot["api_key"], Value::Null);
		assert_eq!(snapshot["email"], json!("ada@example.com"));
	}
}
