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

//! Best-effort asynchronous replication of primary mutations to a backup
//! datastore.
//!
//! Every successful mutation enqueues an equivalent operation, keyed by
//! model and entity id so causally related writes stay ordered. Background
//! workers drain each key strictly FIFO with bounded retries; the primary
//! request path never waits on any of it. Nothing here is durable: the
//! mirror is explicitly best-effort.

use std::time::Duration;

use chrono::{DateTime, Utc};
use ih_core_persist::{Filter, ModelKind, RecordData, StoreError};
use serde::Serialize;
use thiserror::Error;

mod decorator;
mod queue;
mod secondary;

pub use decorator::ReplicatedRepository;
pub use queue::ReplicationScheduler;
pub use secondary::{
	Connect, ReplicationConfig, SecondaryStore, StaticConnect, BACKUP_ENABLED_ENV,
	BACKUP_URL_ENV,
};

/// Most tasks one key may hold; past this the oldest pending task is
/// dropped rather than blocking the producer.
pub const MAX_QUEUE_DEPTH: usize = 1000;

/// Retries after the first failed attempt of a task.
pub const MAX_RETRIES: u8 = 3;

/// Backoff before each retry, indexed by the attempt that just failed.
pub const RETRY_BACKOFF: [Duration; 3] = [
	Duration::from_millis(100),
	Duration::from_millis(500),
	Duration::from_millis(2000),
];

#[derive(Debug, Error)]
pub enum ReplicationError {
	#[error("secondary store unavailable: {0}")]
	Unavailable(StoreError),
	#[error("secondary apply failed: {0}")]
	Apply(#[from] StoreError),
}

/// The operation and its arguments, mirroring the primary mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskArgs {
	Upsert { id: String, data: RecordData },
	Delete { id: String },
	DeleteMany { filter: Filter },
	UpdateMany { filter: Filter, data: RecordData },
}

impl TaskArgs {
	/// The entity this operation is scoped to, when one is known. Bulk
	/// operations order behind the whole model instead.
	#[must_use]
	pub fn entity_key(&self) -> Option<&str> {
		match self {
			Self::Upsert { id, .. } | Self::Delete { id } => Some(id),
			Self::DeleteMany { .. } | Self::UpdateMany { .. } => None,
		}
	}

	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Upsert { .. } => "upsert",
			Self::Delete { .. } => "delete",
			Self::DeleteMany { .. } => "delete_many",
			Self::UpdateMany { .. } => "update_many",
		}
	}
}

/// One buffered operation awaiting application to the secondary store.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationTask {
	pub model: ModelKind,
	pub args: TaskArgs,
	pub retry_count: u8,
	pub enqueued_at: DateTime<Utc>,
}

impl ReplicationTask {
	#[must_use]
	pub fn new(model: ModelKind, args: TaskArgs) -> Self {
		Self {
			model,
			args,
			retry_count: 0,
			enqueued_at: Utc::now(),
		}
	}

	/// `"{model}:{id}"` when an entity id is known, else the model alone.
	#[must_use]
	pub fn queue_key(&self) -> String {
		match self.args.entity_key() {
			Some(id) => format!("{}:{id}", self.model),
			None => self.model.to_string(),
		}
	}
}
