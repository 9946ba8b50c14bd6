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

//! Scope-bound carrier of the acting identity.
//!
//! The request-handling layer establishes a scope once per inbound
//! operation; anything running inside it, however deeply nested, can read
//! the actor without parameter threading. Scopes are task-local, so
//! concurrent operations sharing a worker pool never see each other's
//! identity.

use std::future::Future;

use serde::{Deserialize, Serialize};

tokio::task_local! {
	static CURRENT: ActorContext;
}

/// Identity and request metadata of whoever is responsible for the current
/// logical operation. Lives for one scope; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
	pub user_id: Option<String>,
	pub team_id: Option<String>,
	pub email: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

impl ActorContext {
	#[must_use]
	pub fn for_user(user_id: impl Into<String>) -> Self {
		Self {
			user_id: Some(user_id.into()),
			..Self::default()
		}
	}

	/// No user and no team identity.
	#[must_use]
	pub const fn is_anonymous(&self) -> bool {
		self.user_id.is_none() && self.team_id.is_none()
	}
}

/// Establishes `context` for the duration of `fut`.
pub async fn with_context<F: Future>(context: ActorContext, fut: F) -> F::Output {
	CURRENT.scope(context, fut).await
}

/// Synchronous variant of [`with_context`].
pub fn with_context_sync<T>(context: ActorContext, f: impl FnOnce() -> T) -> T {
	CURRENT.sync_scope(context, f)
}

/// The active context, or an empty one when no scope is established.
#[must_use]
pub fn current() -> ActorContext {
	CURRENT.try_with(Clone::clone).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn no_scope_yields_an_empty_context() {
		let ctx = current();
		assert!(ctx.is_anonymous());
		assert_eq!(ctx, ActorContext::default());
	}

	#[tokio::test]
	async fn scope_is_visible_to_nested_calls() {
		async fn nested() -> Option<String> {
			current().user_id
		}

		let seen = with_context(ActorContext::for_user("u1"), async { nested().await }).await;
		assert_eq!(seen.as_deref(), Some("u1"));
		assert!(current().is_anonymous());
	}

	#[tokio::test]
	async fn concurrent_scopes_are_isolated() {
		let a = tokio::spawn(with_context(ActorContext::for_user("a"), async {
			tokio::task::yield_now().await;
			current().user_id
		}));
		let b = tokio::spawn(with_context(ActorContext::for_user("b"), async {
			tokio::task::yield_now().await;
			current().user_id
		}));

		assert_eq!(a.await.unwrap().as_deref(), Some("a"));
		assert_eq!(b.await.unwrap().as_deref(), Some("b"));
	}

	#[test]
	fn sync_scope_works_without_a_runtime() {
		let user = with_context_sync(ActorContext::for_user("sync"), || current().user_id);
		assert_eq!(user.as_deref(), Some("sync"));
	}
}
