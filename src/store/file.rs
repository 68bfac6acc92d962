//! File-backed [`KvStore`] for single-node deployments that must survive restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{KvStore, StoreError, StoreFuture, StoreKey, StoredValue},
};

type Snapshot = HashMap<StoreKey, StoredValue>;

/// Persists entries to a JSON snapshot after each mutation.
///
/// Expired entries are skipped on load and pruned whenever the snapshot is rewritten.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading live entries.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<(StoreKey, StoredValue)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;
		let now = OffsetDateTime::now_utc();

		Ok(entries.into_iter().filter(|(_, stored)| stored.is_live_at(now)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	/// Writes `next` to disk and only then installs it as the live snapshot.
	///
	/// A failed write leaves `current` untouched, so a retried call sees the same state.
	fn commit(&self, current: &mut Snapshot, mut next: Snapshot) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();

		next.retain(|_, stored| stored.is_live_at(now));

		self.persist(&next)?;

		*current = next;

		Ok(())
	}

	fn persist(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.iter().collect();
		let serialized = serde_json::to_vec_pretty(&snapshot).map_err(|e| {
			StoreError::serialization(format!("Failed to serialize store snapshot: {e}"))
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl KvStore for FileStore {
	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let stored = StoredValue::new(value, ttl, OffsetDateTime::now_utc())?;
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.insert(key.to_owned(), stored);

			self.commit(&mut guard, next)
		})
	}

	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let guard = self.inner.read();

			Ok(guard.get(key).filter(|stored| stored.is_live_at(now)).map(|s| s.value.clone()))
		})
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.contains_key(key) {
				let mut next = guard.clone();

				next.remove(key);
				self.commit(&mut guard, next)?;
			}

			Ok(())
		})
	}

	fn take<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut guard = self.inner.write();
			let mut next = guard.clone();
			let Some(stored) = next.remove(key) else {
				return Ok(None);
			};

			self.commit(&mut guard, next)?;

			Ok(stored.is_live_at(now).then_some(stored.value))
		})
	}

	fn delete_if<'a>(&'a self, key: &'a StoreKey, expected: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut guard = self.inner.write();
			let matches = guard
				.get(key)
				.is_some_and(|stored| stored.is_live_at(now) && stored.value == expected);

			if matches {
				let mut next = guard.clone();

				next.remove(key);
				self.commit(&mut guard, next)?;
			}

			Ok(matches)
		})
	}

	fn atomic_take(&self) -> bool {
		true
	}
}
