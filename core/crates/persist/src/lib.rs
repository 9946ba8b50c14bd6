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

//! Primary-store abstraction: records, filters, the model registry and the
//! repository seam every interception layer wraps.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub mod error;
mod memory;
mod record;
mod repository;
mod retry;
pub mod soft_delete;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{id_of, Filter, RecordData, DELETED_AT, ID};
pub use repository::{Datastore, Repository};
pub use retry::{with_retries, RetryingStore};
pub use soft_delete::ScopedRepository;

/// Closed registry of the platform's persisted models.
///
/// Dispatch is by this enum, never by reflective name lookup; a store
/// either has a typed accessor for a kind or it does not.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
	User,
	Team,
	Contact,
	Document,
	Deal,
	AuditLog,
}

impl ModelKind {
	pub const ALL: [Self; 6] = [
		Self::User,
		Self::Team,
		Self::Contact,
		Self::Document,
		Self::Deal,
		Self::AuditLog,
	];

	/// Rows of these models are deleted logically, never physically.
	#[must_use]
	pub const fn is_soft_delete(self) -> bool {
		matches!(self, Self::Team | Self::Contact | Self::Document | Self::Deal)
	}

	/// Mutations of these models produce audit entries.
	#[must_use]
	pub const fn is_audited(self) -> bool {
		matches!(self, Self::User | Self::Team | Self::Document | Self::Deal)
	}
}

#[cfg(test)]
mod tests {
	use super::ModelKind;

	#[test]
	fn model_names_are_stable() {
		// these names end up in filters, queue keys and audit rows
		assert_eq!(ModelKind::AuditLog.to_string(), "audit_log");
		assert_eq!(ModelKind::Team.to_string(), "team");
		assert_eq!("document".parse::<ModelKind>().unwrap(), ModelKind::Document);
	}

	#[test]
	fn audit_log_is_on_neither_allow_list() {
		assert!(!ModelKind::AuditLog.is_soft_delete());
		assert!(!ModelKind::AuditLog.is_audited());
	}
}
