use thiserror::Error;

use crate::ModelKind;

/// Error classes surfaced by store drivers and this layer itself.
///
/// Primary-store errors always propagate unchanged to the caller; only the
/// audit and replication layers swallow their own failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
	#[error("record not found <model='{model}', operation='{operation}'>")]
	NotFound {
		model: ModelKind,
		operation: &'static str,
	},
	#[error("transient store error: {0}")]
	Transient(String),
	#[error("constraint violation: {0}")]
	Constraint(String),
	#[error("store error: {0}")]
	Other(String),
}

/// Driver message fragments that mark a connection-level failure worth
/// retrying.
const TRANSIENT_PATTERNS: &[&str] = &[
	"connection reset",
	"connection refused",
	"connection closed",
	"timed out",
	"broken pipe",
];

impl StoreError {
	/// Classifies a raw driver message, promoting known connection-failure
	/// classes to [`StoreError::Transient`].
	#[must_use]
	pub fn classify(message: impl Into<String>) -> Self {
		let message = message.into();
		let lowered = message.to_ascii_lowercase();

		if TRANSIENT_PATTERNS.iter().any(|p| lowered.contains(p)) {
			Self::Transient(message)
		} else {
			Self::Other(message)
		}
	}

	#[must_use]
	pub const fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_))
	}
}

#[cfg(test)]
mod tests {
	use super::StoreError;

	#[test]
	fn connection_failures_classify_as_transient() {
		assert!(StoreError::classify("Connection reset by peer").is_transient());
		assert!(StoreError::classify("statement timed out").is_transient());
		assert!(!StoreError::classify("syntax error at or near").is_transient());
	}
}
