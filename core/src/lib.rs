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

//! Composition root for the persistence interception layer.
//!
//! [`Database::new`] wraps the primary store's repositories in a fixed
//! decorator order and hands out the augmented surface; everything else
//! in the platform consumes mutations and reads through it.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::info;

pub use ih_context as context;
pub use ih_core_audit as audit;
pub use ih_core_persist as persist;
pub use ih_core_replication as replication;

use ih_core_audit::AuditedRepository;
use ih_core_persist::{Datastore, ModelKind, Repository, RetryingStore, ScopedRepository};
use ih_core_replication::{ReplicatedRepository, ReplicationScheduler, SecondaryStore};

/// The decorated persistence surface.
///
/// Interception order is fixed here and nowhere else: a call enters the
/// soft-delete interceptor, then audit capture, then the replication
/// hook, and finally the retrying primary client. Models missing from an
/// allow-list simply skip that layer.
pub struct Database {
	raw: Arc<dyn Datastore>,
	repos: HashMap<ModelKind, Arc<dyn Repository>>,
	scheduler: ReplicationScheduler,
	secondary: Arc<SecondaryStore>,
}

impl Database {
	#[must_use]
	pub fn new(primary: Arc<dyn Datastore>, secondary: SecondaryStore) -> Self {
		let raw: Arc<dyn Datastore> = Arc::new(RetryingStore::new(primary));
		let secondary = Arc::new(secondary);
		let scheduler = ReplicationScheduler::new(Arc::clone(&secondary));

		let mut repos: HashMap<ModelKind, Arc<dyn Repository>> = HashMap::new();

		for model in ModelKind::ALL {
			if model == ModelKind::AuditLog {
				// only ever written through the raw path, by audit capture
				continue;
			}

			let Some(base) = raw.repo(model) else { continue };

			let mut repo: Arc<dyn Repository> =
				Arc::new(ReplicatedRepository::new(base, scheduler.clone()));

			if model.is_audited() {
				repo = Arc::new(AuditedRepository::new(repo, Arc::clone(&raw)));
			}
			if model.is_soft_delete() {
				repo = Arc::new(ScopedRepository::new(repo));
			}

			repos.insert(model, repo);
		}

		info!(
			"persistence layer ready <replication_enabled={}>",
			scheduler.is_enabled()
		);

		Self {
			raw,
			repos,
			scheduler,
			secondary,
		}
	}

	/// The fully intercepted surface for `model`; `None` for models only
	/// reachable through the raw store.
	#[must_use]
	pub fn repo(&self, model: ModelKind) -> Option<Arc<dyn Repository>> {
		self.repos.get(&model).cloned()
	}

	/// Unfiltered access to the primary store. Bypasses soft delete,
	/// audit capture and replication; administrative tooling only.
	#[must_use]
	pub fn raw(&self) -> &Arc<dyn Datastore> {
		&self.raw
	}

	#[must_use]
	pub fn replication(&self) -> &ReplicationScheduler {
		&self.scheduler
	}

	/// Best-effort flush of pending replication work, then teardown of
	/// both store clients.
	pub async fn shutdown(&self, grace: Duration) {
		self.scheduler.shutdown(grace).await;
		self.secondary.disconnect().await;
		self.raw.disconnect().await;
	}
}
