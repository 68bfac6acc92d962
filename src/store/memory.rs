//! Thread-safe in-memory [`KvStore`] for single-process deployments and tests.

// crates.io
use tokio::{task::JoinHandle, time};
// self
use crate::{
	_prelude::*,
	store::{KvStore, StoreError, StoreFuture, StoreKey, StoredValue},
};

type StoreMap = Arc<RwLock<HashMap<StoreKey, StoredValue>>>;

/// Shortest period accepted by [`MemoryStore::spawn_reaper`].
pub const MIN_REAP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

/// In-process store with lazy expiry.
///
/// Expired entries are hidden on read and dropped on the next write to the same key.
/// [`MemoryStore::purge_expired`] (or [`MemoryStore::spawn_reaper`]) reclaims the rest.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of live entries.
	pub fn len(&self) -> usize {
		let now = OffsetDateTime::now_utc();

		self.0.read().values().filter(|stored| stored.is_live_at(now)).count()
	}

	/// Returns `true` when no live entry remains.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drops every expired entry and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.0.write();
		let before = guard.len();

		guard.retain(|_, stored| stored.is_live_at(now));

		before - guard.len()
	}

	/// Spawns a Tokio task that calls [`MemoryStore::purge_expired`] every `interval`.
	///
	/// Intervals shorter than [`MIN_REAP_INTERVAL`] (including zero) are raised to it.
	/// Must be called from inside a Tokio runtime. Abort the handle to stop the task.
	pub fn spawn_reaper(&self, interval: std::time::Duration) -> JoinHandle<()> {
		let store = self.clone();
		let interval = interval.max(MIN_REAP_INTERVAL);

		tokio::spawn(async move {
			let mut ticker = time::interval(interval);

			loop {
				ticker.tick().await;
				store.purge_expired();
			}
		})
	}

	fn set_now(
		map: StoreMap,
		key: StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> Result<(), StoreError> {
		let stored = StoredValue::new(value, ttl, OffsetDateTime::now_utc())?;

		map.write().insert(key, stored);

		Ok(())
	}

	fn get_now(map: StoreMap, key: &StoreKey) -> Option<String> {
		let now = OffsetDateTime::now_utc();
		let guard = map.read();

		guard.get(key).filter(|stored| stored.is_live_at(now)).map(|stored| stored.value.clone())
	}

	fn take_now(map: StoreMap, key: &StoreKey) -> Option<String> {
		let now = OffsetDateTime::now_utc();
		let removed = map.write().remove(key);

		removed.filter(|stored| stored.is_live_at(now)).map(|stored| stored.value)
	}

	fn delete_if_now(map: StoreMap, key: &StoreKey, expected: &str) -> bool {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();
		let matches = guard
			.get(key)
			.is_some_and(|stored| stored.is_live_at(now) && stored.value == expected);

		if matches {
			guard.remove(key);
		}

		matches
	}
}
impl KvStore for MemoryStore {
	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Self::set_now(map, key, value, ttl) })
	}

	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok::<_, StoreError>(())
		})
	}

	fn take<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::take_now(map, key)) })
	}

	fn delete_if<'a>(&'a self, key: &'a StoreKey, expected: &'a str) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::delete_if_now(map, key, expected)) })
	}

	fn atomic_take(&self) -> bool {
		true
	}
}
