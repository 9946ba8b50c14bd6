//! Per-key FIFO queues and their drain workers.

use std::{
	collections::{HashMap, HashSet, VecDeque},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use ih_core_persist::{ModelKind, StoreError};
use ih_utils::truncate_payload;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::{
	secondary::SecondaryStore, ReplicationError, ReplicationTask, TaskArgs, MAX_QUEUE_DEPTH,
	MAX_RETRIES, RETRY_BACKOFF,
};

/// How much of a dropped task's arguments makes it into the error log.
const LOGGED_ARGS_LIMIT: usize = 512;

#[derive(Default)]
struct State {
	queues: HashMap<String, VecDeque<ReplicationTask>>,
	// keys with a live drain worker; exactly one runs per key
	draining: HashSet<String>,
}

/// Owns the per-key queues and their drain workers.
///
/// Cloning shares the same queues; one scheduler is injected per process
/// at composition time. Ordering guarantees are process-local, so a
/// multi-instance deployment replicates each instance's own writes only.
#[derive(Clone)]
pub struct ReplicationScheduler {
	state: Arc<Mutex<State>>,
	secondary: Arc<SecondaryStore>,
}

impl ReplicationScheduler {
	#[must_use]
	pub fn new(secondary: Arc<SecondaryStore>) -> Self {
		Self {
			state: Arc::new(Mutex::new(State::default())),
			secondary,
		}
	}

	#[must_use]
	pub fn is_enabled(&self) -> bool {
		self.secondary.is_enabled()
	}

	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Buffers one mutation for the secondary store.
	///
	/// Never blocks and never fails: when the key's queue is full the
	/// oldest pending task is dropped, and without an async runtime the
	/// task is discarded with a warning. A drain worker is scheduled for
	/// the key unless one is already running.
	pub fn enqueue(&self, model: ModelKind, args: TaskArgs) {
		if !self.is_enabled() {
			return;
		}

		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			warn!(
				"no async runtime, dropping replication task <model='{model}', op='{}'>",
				args.kind()
			);
			return;
		};

		let task = ReplicationTask::new(model, args);
		let key = task.queue_key();

		let spawn_drain = {
			let mut state = self.state();
			let queue = state.queues.entry(key.clone()).or_default();

			if queue.len() >= MAX_QUEUE_DEPTH {
				queue.pop_front();
				warn!("replication queue overflow <key='{key}'>, dropped the oldest pending task");
			}
			queue.push_back(task);

			state.draining.insert(key.clone())
		};

		if spawn_drain {
			let scheduler = self.clone();
			handle.spawn(async move { scheduler.drain(key).await });
		}
	}

	/// Applies one key's tasks strictly in enqueue order until the queue
	/// empties. A failing task is retried in place with backoff; later
	/// tasks for the key wait behind it, preserving causal order.
	async fn drain(self, key: String) {
		loop {
			let Some(mut task) = self.pop(&key) else { break };

			loop {
				match self.apply(&task).await {
					Ok(()) => break,
					Err(e) if task.retry_count < MAX_RETRIES => {
						let backoff = RETRY_BACKOFF[usize::from(task.retry_count)];
						task.retry_count += 1;
						warn!(
							"replication attempt failed <key='{key}', op='{}', retry={}>: {e}",
							task.args.kind(),
							task.retry_count
						);
						sleep(backoff).await;
					}
					Err(e) => {
						let args = serde_json::to_string(&task.args)
							.unwrap_or_else(|_| task.args.kind().to_string());
						error!(
							"replication task dropped after {MAX_RETRIES} retries <key='{key}', op='{}'> args={}: {e}",
							task.args.kind(),
							truncate_payload(&args, LOGGED_ARGS_LIMIT)
						);
						break;
					}
				}
			}
		}
	}

	/// Pops the next task, or tears the key's entry down when empty so
	/// the map stays bounded. The pop and the worker-exit decision are
	/// one atomic step; a task enqueued concurrently either lands before
	/// the pop or finds `draining` already cleared and spawns a fresh
	/// worker.
	fn pop(&self, key: &str) -> Option<ReplicationTask> {
		let mut state = self.state();

		if let Some(task) = state.queues.get_mut(key).and_then(VecDeque::pop_front) {
			return Some(task);
		}

		state.queues.remove(key);
		state.draining.remove(key);
		None
	}

	/// One attempt against the secondary store. An unknown model there is
	/// success, as is deleting a row the mirror never saw.
	async fn apply(&self, task: &ReplicationTask) -> Result<(), ReplicationError> {
		if !self.secondary.is_enabled() {
			debug!("replication disabled mid-flight, discarding task <model='{}'>", task.model);
			return Ok(());
		}

		let client = self
			.secondary
			.client()
			.await
			.map_err(ReplicationError::Unavailable)?;

		let Some(repo) = client.repo(task.model) else {
			warn!(
				"secondary store has no accessor for model '{}', skipping task",
				task.model
			);
			return Ok(());
		};

		match task.args.clone() {
			TaskArgs::Upsert { id, data } => {
				repo.upsert(&id, data).await?;
			}
			TaskArgs::Delete { id } => match repo.delete(&id).await {
				Ok(_) => {}
				Err(StoreError::NotFound { .. }) => {
					debug!(
						"row already absent on secondary <model='{}', id='{id}'>",
						task.model
					);
				}
				Err(e) => return Err(e.into()),
			},
			TaskArgs::DeleteMany { filter } => {
				repo.delete_many(filter).await?;
			}
			TaskArgs::UpdateMany { filter, data } => {
				repo.update_many(filter, data).await?;
			}
		}

		Ok(())
	}

	/// True while no key has buffered or in-flight work.
	#[must_use]
	pub fn is_idle(&self) -> bool {
		let state = self.state();
		state.queues.is_empty() && state.draining.is_empty()
	}

	/// Waits up to `grace` for the queues to drain, then gives up with a
	/// warning. Cancels nothing; a stuck secondary call simply outlives
	/// the wait.
	pub async fn shutdown(&self, grace: Duration) {
		let deadline = tokio::time::Instant::now() + grace;

		while !self.is_idle() {
			if tokio::time::Instant::now() >= deadline {
				warn!("replication queues still busy after {grace:?}, giving up the wait");
				return;
			}
			sleep(Duration::from_millis(25)).await;
		}
	}
}
