//! Bounded retry decorator for flaky networked backends.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	obs,
	store::{KvStore, StoreError, StoreFuture, StoreKey},
};

/// Largest accepted [`RetryPolicy::backoff`].
pub const MAX_BACKOFF: Duration = Duration::seconds(10);

/// How many times a store call is attempted and how long to wait between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	/// Base delay; attempt `n` waits `n × backoff` before retrying. Serialized as milliseconds.
	#[serde(with = "crate::config::duration_millis")]
	pub backoff: Duration,
}
impl RetryPolicy {
	/// Single attempt, no retries.
	pub const fn none() -> Self {
		Self { max_attempts: 1, backoff: Duration::ZERO }
	}

	/// Checks that at least one attempt is allowed and the backoff is within `[0, 10 s]`.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::NoStoreAttempts);
		}
		if self.backoff.is_negative() {
			return Err(ConfigError::InvalidSetting {
				key: "store_retry.backoff".into(),
				reason: "backoff cannot be negative".into(),
			});
		}
		if self.backoff > MAX_BACKOFF {
			return Err(ConfigError::InvalidSetting {
				key: "store_retry.backoff".into(),
				reason: format!("backoff cannot exceed {MAX_BACKOFF}"),
			});
		}

		Ok(())
	}

	fn delay_after(&self, attempt: u32) -> std::time::Duration {
		let factor = i32::try_from(attempt).unwrap_or(i32::MAX);

		self.backoff.saturating_mul(factor).unsigned_abs()
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_attempts: 3, backoff: Duration::milliseconds(100) }
	}
}

/// Wraps any [`KvStore`] and retries [`StoreError::Backend`] failures.
///
/// Once the budget is spent the call fails with [`StoreError::Unavailable`]. Other errors
/// are returned on the first occurrence.
pub struct RetryingStore<S>
where
	S: ?Sized + KvStore,
{
	inner: Arc<S>,
	policy: RetryPolicy,
}
impl<S> RetryingStore<S>
where
	S: ?Sized + KvStore,
{
	/// Wraps `inner` with the provided policy.
	pub fn new(inner: Arc<S>, policy: RetryPolicy) -> Self {
		Self { inner, policy }
	}

	/// Returns the wrapped store.
	pub fn inner(&self) -> &Arc<S> {
		&self.inner
	}

	/// Returns the active policy.
	pub fn policy(&self) -> RetryPolicy {
		self.policy
	}

	async fn run<'a, T, F>(&'a self, operation: &'static str, mut call: F) -> Result<T, StoreError>
	where
		F: FnMut() -> StoreFuture<'a, T>,
	{
		let mut attempt = 1;

		loop {
			match call().await {
				Err(StoreError::Backend { message }) => {
					if attempt >= self.policy.max_attempts {
						return Err(StoreError::Unavailable { attempts: attempt, message });
					}

					obs::record_store_retry(operation, attempt, &message);
					tokio::time::sleep(self.policy.delay_after(attempt)).await;

					attempt += 1;
				},
				other => return other,
			}
		}
	}
}
impl<S> KvStore for RetryingStore<S>
where
	S: ?Sized + KvStore,
{
	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()> {
		Box::pin(self.run("set", move || self.inner.set(key, value.clone(), ttl)))
	}

	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		Box::pin(self.run("get", move || self.inner.get(key)))
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, ()> {
		Box::pin(self.run("delete", move || self.inner.delete(key)))
	}

	fn take<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		Box::pin(self.run("take", move || self.inner.take(key)))
	}

	fn delete_if<'a>(&'a self, key: &'a StoreKey, expected: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(self.run("delete_if", move || self.inner.delete_if(key, expected)))
	}

	fn atomic_take(&self) -> bool {
		self.inner.atomic_take()
	}
}
impl<S> Debug for RetryingStore<S>
where
	S: ?Sized + KvStore,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryingStore").field("policy", &self.policy).finish_non_exhaustive()
	}
}
