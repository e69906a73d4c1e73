use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;

use crate::{FetchError, FetchOutcome};

type Shared = watch::Receiver<Option<FetchOutcome>>;

/// Outstanding fetches keyed by request key. Followers share the leader's result.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
	entries: Mutex<HashMap<String, Shared>>,
}
impl InFlightRegistry {
	/// Registers `request_key`, or subscribes to the fetch already registered under it.
	pub fn join(self: &Arc<Self>, request_key: &str) -> Joined {
		let mut entries = self.lock();

		if let Some(rx) = entries.get(request_key) {
			return Joined::Follower(Waiter { rx: rx.clone() });
		}

		let (tx, rx) = watch::channel(None);

		entries.insert(request_key.to_string(), rx.clone());

		Joined::Leader(
			InFlightLease { registry: Arc::clone(self), request_key: request_key.to_string(), tx },
			Waiter { rx },
		)
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, Shared>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

pub enum Joined {
	Leader(InFlightLease, Waiter),
	Follower(Waiter),
}

/// Held by the task performing the fetch. The registry entry goes away when the lease drops,
/// whether or not a result was published.
pub struct InFlightLease {
	registry: Arc<InFlightRegistry>,
	request_key: String,
	tx: watch::Sender<Option<FetchOutcome>>,
}
impl InFlightLease {
	pub fn request_key(&self) -> &str {
		&self.request_key
	}

	pub fn complete(self, outcome: FetchOutcome) {
		self.tx.send_replace(Some(outcome));
	}
}
impl Drop for InFlightLease {
	fn drop(&mut self) {
		self.registry.lock().remove(&self.request_key);
	}
}

pub struct Waiter {
	rx: Shared,
}
impl Waiter {
	/// Resolves once the leader publishes. A leader that vanished yields `Interrupted`.
	pub async fn wait(mut self) -> FetchOutcome {
		match self.rx.wait_for(Option::is_some).await {
			Ok(outcome) => outcome.clone().unwrap_or(Err(FetchError::Interrupted)),
			Err(_) => Err(FetchError::Interrupted),
		}
	}
}
