//! Lazily-connected handle to the backup datastore.

use std::sync::Arc;

use async_trait::async_trait;
use ih_core_persist::{Datastore, StoreError};
use ih_utils::env_flag;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const BACKUP_ENABLED_ENV: &str = "BACKUP_ENABLED";
pub const BACKUP_URL_ENV: &str = "BACKUP_DATABASE_URL";

/// Replication feature switch plus the backup connection string.
#[derive(Debug, Clone, Default)]
pub struct ReplicationConfig {
	pub enabled: bool,
	pub url: Option<String>,
}

impl ReplicationConfig {
	#[must_use]
	pub fn from_env() -> Self {
		Self {
			enabled: env_flag(BACKUP_ENABLED_ENV),
			url: std::env::var(BACKUP_URL_ENV)
				.ok()
				.filter(|url| !url.is_empty()),
		}
	}

	#[must_use]
	pub fn disabled() -> Self {
		Self::default()
	}
}

/// Opens a datastore client from a connection string.
#[async_trait]
pub trait Connect: Send + Sync {
	async fn connect(&self, url: &str) -> Result<Arc<dyn Datastore>, StoreError>;
}

/// Connector returning a pre-built client, for embedded setups and tests.
pub struct StaticConnect(pub Arc<dyn Datastore>);

#[async_trait]
impl Connect for StaticConnect {
	async fn connect(&self, _url: &str) -> Result<Arc<dyn Datastore>, StoreError> {
		Ok(Arc::clone(&self.0))
	}
}

/// Lazily constructs and caches the backup-store client.
pub struct SecondaryStore {
	config: ReplicationConfig,
	connector: Box<dyn Connect>,
	client: Mutex<Option<Arc<dyn Datastore>>>,
}

impl SecondaryStore {
	#[must_use]
	pub fn new(config: ReplicationConfig, connector: impl Connect + 'static) -> Self {
		Self {
			config,
			connector: Box::new(connector),
			client: Mutex::new(None),
		}
	}

	/// True only when the feature flag and a connection string are both
	/// configured.
	#[must_use]
	pub fn is_enabled(&self) -> bool {
		self.config.enabled && self.config.url.is_some()
	}

	/// The cached client, connecting on first use. A connection failure
	/// propagates so the caller can retry the task later; the next call
	/// attempts a fresh connection.
	pub async fn client(&self) -> Result<Arc<dyn Datastore>, StoreError> {
		let Some(url) = self.config.url.as_deref().filter(|_| self.config.enabled) else {
			return Err(StoreError::Other("backup store is not configured".to_string()));
		};

		let mut cached = self.client.lock().await;

		if let Some(client) = cached.as_ref() {
			return Ok(Arc::clone(client));
		}

		let client = self.connector.connect(url).await?;
		info!("connected to backup datastore");
		*cached = Some(Arc::clone(&client));

		Ok(client)
	}

	/// Disconnects and drops the cached client. Safe to call repeatedly;
	/// a later [`Self::client`] call reconnects.
	pub async fn disconnect(&self) {
		if let Some(client) = self.client.lock().await.take() {
			client.disconnect().await;
			debug!("backup datastore client dropped");
		}
	}
}
