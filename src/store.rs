//! Ephemeral key-value storage contracts and built-in backends.
//!
//! Every value lives under a [`StoreKey`] with an optional time-to-live; expired entries are
//! indistinguishable from absent ones. Backends must make per-key operations atomic.
//! [`KvStore::take`] and [`KvStore::delete_if`] have non-atomic default implementations so
//! minimal backends stay conforming; the shipped backends override both.

pub mod file;
pub mod memory;
pub mod retry;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};

// self
use crate::{
	_prelude::*,
	auth::{OrgId, ProviderId, UserId},
};

/// Boxed future returned by every [`KvStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key-value backend with per-key expiry.
pub trait KvStore
where
	Self: Send + Sync,
{
	/// Inserts or replaces `value`; `ttl` of `None` keeps it until deleted.
	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()>;

	/// Returns the live value for `key`, if any.
	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>>;

	/// Removes `key`. Deleting an absent key succeeds.
	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, ()>;

	/// Returns and removes the live value for `key`.
	///
	/// The default issues `get` then `delete`, so two concurrent callers may both observe the
	/// value. Backends that can do better override this and [`KvStore::atomic_take`].
	fn take<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let value = self.get(key).await?;

			if value.is_some() {
				self.delete(key).await?;
			}

			Ok(value)
		})
	}

	/// Removes `key` only if its live value equals `expected`; reports whether it did.
	fn delete_if<'a>(&'a self, key: &'a StoreKey, expected: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			match self.get(key).await? {
				Some(current) if current == expected => {
					self.delete(key).await?;

					Ok(true)
				},
				_ => Ok(false),
			}
		})
	}

	/// Whether [`KvStore::take`] and [`KvStore::delete_if`] are atomic for this backend.
	fn atomic_take(&self) -> bool {
		false
	}
}

/// Error type produced by [`KvStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A stored value could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure (connectivity, I/O); safe to retry.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend kept failing until the retry budget ran out.
	#[error("Store unavailable after {attempts} attempts: {message}.")]
	Unavailable {
		/// Attempts made before giving up.
		attempts: u32,
		/// Last backend failure.
		message: String,
	},
}
impl StoreError {
	/// Returns `true` when retrying the same operation may succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Backend { .. })
	}

	pub(crate) fn serialization(err: impl Display) -> Self {
		Self::Serialization { message: err.to_string() }
	}
}

/// Record kinds kept by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
	/// Pending authorization state.
	State,
	/// Exchanged credentials awaiting handoff.
	Credentials,
}
impl KeyKind {
	/// Returns the label used in the textual key form.
	pub const fn as_str(self) -> &'static str {
		match self {
			KeyKind::State => "state",
			KeyKind::Credentials => "credentials",
		}
	}
}

/// Composite key identifying one record per provider, kind, and identity.
///
/// Displays as `{provider}_{kind}:{org}:{user}`, the layout networked caches use.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Record kind.
	pub kind: KeyKind,
	/// Provider the record belongs to.
	pub provider: ProviderId,
	/// Organization component.
	pub org_id: OrgId,
	/// User component.
	pub user_id: UserId,
}
impl StoreKey {
	/// Key of the pending state record for an identity.
	pub fn state(provider: &ProviderId, org_id: &OrgId, user_id: &UserId) -> Self {
		Self::new(KeyKind::State, provider, org_id, user_id)
	}

	/// Key of the stored credentials for an identity.
	pub fn credentials(provider: &ProviderId, org_id: &OrgId, user_id: &UserId) -> Self {
		Self::new(KeyKind::Credentials, provider, org_id, user_id)
	}

	fn new(kind: KeyKind, provider: &ProviderId, org_id: &OrgId, user_id: &UserId) -> Self {
		Self { kind, provider: provider.clone(), org_id: org_id.clone(), user_id: user_id.clone() }
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}_{}:{}:{}", self.provider, self.kind.as_str(), self.org_id, self.user_id)
	}
}

/// Value plus absolute expiry, shared by the in-process backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredValue {
	pub(crate) value: String,
	pub(crate) expires_at: Option<OffsetDateTime>,
}
impl StoredValue {
	/// Fails when `now + ttl` falls outside the representable date range.
	pub(crate) fn new(
		value: String,
		ttl: Option<Duration>,
		now: OffsetDateTime,
	) -> Result<Self, StoreError> {
		let expires_at = ttl
			.map(|ttl| {
				now.checked_add(ttl).ok_or_else(|| {
					StoreError::serialization(format!("TTL of {ttl} overflows the expiry instant"))
				})
			})
			.transpose()?;

		Ok(Self { value, expires_at })
	}

	pub(crate) fn is_live_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|deadline| now < deadline)
	}
}
