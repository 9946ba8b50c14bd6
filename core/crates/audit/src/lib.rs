#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Immutable audit trail for mutations on sensitive models.
//!
//! Entries are written through the raw datastore on a detached task; the
//! triggering mutation never waits on them and never observes their
//! failures. A mutation with no actor identity in scope produces no entry
//! at all.

use chrono::{DateTime, Utc};
use ih_context::ActorContext;
use ih_core_persist::{ModelKind, RecordData};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::Display;

pub mod capture;
pub mod changes;

pub use capture::{recent_for_resource, AuditedRepository};
pub use changes::{compute_changes, sanitize_snapshot};

/// What a mutation did, as recorded on the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
	Create,
	Update,
	Delete,
}

/// One immutable audit record. Written once, never updated or deleted by
/// this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
	pub actor_user_id: Option<String>,
	pub actor_team_id: Option<String>,
	pub event_type: String,
	pub resource_type: String,
	pub resource_id: String,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub metadata: Value,
	pub created_at: DateTime<Utc>,
}

impl AuditEntry {
	#[must_use]
	pub fn build(
		action: AuditAction,
		model: ModelKind,
		resource_id: &str,
		actor: &ActorContext,
		changes: Option<Map<String, Value>>,
		snapshot: Option<RecordData>,
	) -> Self {
		let now = Utc::now();

		let mut metadata = Map::new();
		metadata.insert("action".to_string(), Value::String(action.to_string()));
		metadata.insert("model".to_string(), Value::String(model.to_string()));
		metadata.insert("timestamp".to_string(), Value::String(now.to_rfc3339()));
		metadata.insert(
			"actor_email".to_string(),
			actor.email.clone().map_or(Value::Null, Value::String),
		);
		if let Some(changes) = changes {
			metadata.insert("changes".to_string(), Value::Object(changes));
		}
		if let Some(snapshot) = snapshot {
			metadata.insert("snapshot".to_string(), Value::Object(snapshot));
		}

		Self {
			actor_user_id: actor.user_id.clone(),
			actor_team_id: actor.team_id.clone(),
			event_type: action.to_string(),
			resource_type: model.to_string(),
			resource_id: resource_id.to_string(),
			ip_address: actor.ip_address.clone(),
			user_agent: actor.user_agent.clone(),
			metadata: Value::Object(metadata),
			created_at: now,
		}
	}

	/// The entry as a row for the audit-log accessor.
	pub fn to_record(&self) -> Result<RecordData, serde_json::Error> {
		match serde_json::to_value(self)? {
			Value::Object(map) => Ok(map),
			_ => unreachable!("audit entries serialize to objects"),
		}
	}
}
