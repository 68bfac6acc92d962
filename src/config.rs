//! Client configuration for one provider integration.
//!
//! A [`ClientConfig`] is handed to the gateway at construction and validated once. It can be
//! built in code, deserialized from an application's own config file, or loaded from
//! environment variables with [`ClientConfig::from_env`]:
//!
//! | Variable                     | Required | Meaning                                   |
//! |------------------------------|----------|-------------------------------------------|
//! | `{PREFIX}_CLIENT_ID`         | yes      | OAuth client id                           |
//! | `{PREFIX}_CLIENT_SECRET`     | yes      | OAuth client secret                       |
//! | `{PREFIX}_REDIRECT_URI`      | yes      | Callback URL registered with the provider |
//! | `{PREFIX}_SCOPES`            | no       | Space- or comma-separated scopes          |
//! | `{PREFIX}_STATE_TTL_SECS`    | no       | Pending state lifetime (max 600)          |
//! | `{PREFIX}_CREDENTIAL_TTL_SECS` | no     | Stored credential ceiling (max 1 day)     |
//! | `{PREFIX}_EXCHANGE_TIMEOUT_SECS` | no   | Token endpoint timeout (max 5 minutes)    |
//! | `{PREFIX}_HANDOFF`           | no       | `single_use` or `expiry_only`             |

// std
use std::env;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::ConfigError,
	flows::HandoffPolicy,
	provider::is_https_or_loopback,
	store::RetryPolicy,
};

/// Default and maximum lifetime of a pending authorization state.
pub const MAX_STATE_TTL: Duration = Duration::minutes(10);
/// Default ceiling on how long exchanged credentials stay in the store.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::minutes(10);
/// Largest accepted credential lifetime ceiling.
pub const MAX_CREDENTIAL_TTL: Duration = Duration::days(1);
/// Default bound on a single token endpoint call.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::seconds(10);
/// Largest accepted token endpoint timeout.
pub const MAX_EXCHANGE_TIMEOUT: Duration = Duration::minutes(5);

/// Validated OAuth client settings plus gateway tuning knobs.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
	/// OAuth client id issued by the provider.
	pub client_id: String,
	/// OAuth client secret issued by the provider.
	pub client_secret: Secret,
	/// Callback URL registered with the provider.
	pub redirect_uri: Url,
	/// Scopes requested on the consent URL.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Lifetime of a pending state; must be in `(0, 10 minutes]`.
	#[serde(
		default = "default_state_ttl",
		deserialize_with = "duration_secs::deserialize"
	)]
	pub state_ttl: Duration,
	/// Upper bound on the stored credential lifetime; must be in `(0, 1 day]`.
	#[serde(
		default = "default_credential_ttl",
		deserialize_with = "duration_secs::deserialize"
	)]
	pub credential_ttl_ceiling: Duration,
	/// Whether a fetch consumes the stored credentials.
	#[serde(default)]
	pub handoff: HandoffPolicy,
	/// Bound on the token endpoint round trip; must be in `(0, 5 minutes]`.
	#[serde(
		default = "default_exchange_timeout",
		deserialize_with = "duration_secs::deserialize"
	)]
	pub exchange_timeout: Duration,
	/// Retry budget for store calls.
	#[serde(default)]
	pub store_retry: RetryPolicy,
}
impl ClientConfig {
	/// Creates a configuration with default tuning and no scopes.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: Secret::new(client_secret),
			redirect_uri,
			scopes: Vec::new(),
			state_ttl: MAX_STATE_TTL,
			credential_ttl_ceiling: DEFAULT_CREDENTIAL_TTL,
			handoff: HandoffPolicy::default(),
			exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
			store_retry: RetryPolicy::default(),
		}
	}

	/// Loads the configuration from `{prefix}_*` environment variables and validates it.
	pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
		Self::from_lookup(prefix, |key| env::var(key).ok())
	}

	/// Same as [`ClientConfig::from_env`] but reads values through `lookup`.
	pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |suffix: &str| {
			let key = format!("{prefix}_{suffix}");
			let value = lookup(&key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

			(key, value)
		};
		let require = |suffix: &str| match read(suffix) {
			(_, Some(value)) => Ok(value),
			(key, None) => Err(ConfigError::MissingSetting { key }),
		};
		let client_id = require("CLIENT_ID")?;
		let client_secret = require("CLIENT_SECRET")?;
		let redirect_uri = Url::parse(&require("REDIRECT_URI")?)
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let mut config = Self::new(client_id, client_secret, redirect_uri);

		if let (_, Some(scopes)) = read("SCOPES") {
			config.scopes = split_scopes(&scopes);
		}
		if let (key, Some(raw)) = read("STATE_TTL_SECS") {
			config.state_ttl = parse_secs(key, &raw)?;
		}
		if let (key, Some(raw)) = read("CREDENTIAL_TTL_SECS") {
			config.credential_ttl_ceiling = parse_secs(key, &raw)?;
		}
		if let (key, Some(raw)) = read("EXCHANGE_TIMEOUT_SECS") {
			config.exchange_timeout = parse_secs(key, &raw)?;
		}
		if let (key, Some(raw)) = read("HANDOFF") {
			config.handoff = raw
				.parse()
				.map_err(|reason: String| ConfigError::InvalidSetting { key, reason })?;
		}

		config.validate()?;

		Ok(config)
	}

	/// Replaces the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the pending state lifetime.
	pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
		self.state_ttl = ttl;

		self
	}

	/// Overrides the stored credential lifetime ceiling.
	pub fn with_credential_ttl_ceiling(mut self, ceiling: Duration) -> Self {
		self.credential_ttl_ceiling = ceiling;

		self
	}

	/// Overrides the handoff policy.
	pub fn with_handoff(mut self, handoff: HandoffPolicy) -> Self {
		self.handoff = handoff;

		self
	}

	/// Overrides the token endpoint timeout.
	pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
		self.exchange_timeout = timeout;

		self
	}

	/// Overrides the store retry policy.
	pub fn with_store_retry(mut self, policy: RetryPolicy) -> Self {
		self.store_retry = policy;

		self
	}

	/// Checks every setting, failing on the first problem.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::InvalidSetting {
				key: "client_id".into(),
				reason: "must not be empty".into(),
			});
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::InvalidSetting {
				key: "client_secret".into(),
				reason: "must not be empty".into(),
			});
		}
		if !is_https_or_loopback(&self.redirect_uri) {
			return Err(ConfigError::InsecureRedirect { url: self.redirect_uri.to_string() });
		}
		if let Some(scope) =
			self.scopes.iter().find(|scope| scope.is_empty() || scope.contains(char::is_whitespace))
		{
			return Err(ConfigError::InvalidScope { scope: scope.clone() });
		}
		if !self.state_ttl.is_positive() || self.state_ttl > MAX_STATE_TTL {
			return Err(ConfigError::StateTtlOutOfRange);
		}

		check_duration("credential TTL ceiling", self.credential_ttl_ceiling, MAX_CREDENTIAL_TTL)?;
		check_duration("exchange timeout", self.exchange_timeout, MAX_EXCHANGE_TIMEOUT)?;

		self.store_retry.validate()
	}
}

fn check_duration(
	setting: &'static str,
	value: Duration,
	max: Duration,
) -> Result<(), ConfigError> {
	if !value.is_positive() {
		return Err(ConfigError::NonPositiveDuration { setting });
	}
	if value > max {
		return Err(ConfigError::DurationTooLong { setting, max });
	}

	Ok(())
}

/// Serde adapter reading a [`Duration`] from whole seconds.
mod duration_secs {
	// crates.io
	use serde::Deserializer;
	// self
	use crate::_prelude::*;

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
pub(crate) mod duration_millis {
	// crates.io
	use serde::{Deserializer, Serializer, ser::Error as _};
	// self
	use crate::_prelude::*;

	pub(crate) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let millis = i64::try_from(value.whole_milliseconds()).map_err(S::Error::custom)?;

		serializer.serialize_i64(millis)
	}

	pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::milliseconds)
	}
}

fn default_state_ttl() -> Duration {
	MAX_STATE_TTL
}

fn default_credential_ttl() -> Duration {
	DEFAULT_CREDENTIAL_TTL
}

fn default_exchange_timeout() -> Duration {
	DEFAULT_EXCHANGE_TIMEOUT
}

fn split_scopes(raw: &str) -> Vec<String> {
	raw.split(|c: char| c == ',' || c.is_whitespace())
		.filter(|scope| !scope.is_empty())
		.map(str::to_owned)
		.collect()
}

fn parse_secs(key: String, raw: &str) -> Result<Duration, ConfigError> {
	raw.parse::<i64>()
		.map(Duration::seconds)
		.map_err(|e| ConfigError::InvalidSetting { key, reason: e.to_string() })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> ClientConfig {
		ClientConfig::new(
			"client",
			"secret",
			Url::parse("https://app.example.com/callback").expect("Redirect fixture should parse."),
		)
	}

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |key| map.get(key).cloned()
	}

	#[test]
	fn defaults_are_valid() {
		let config = base();

		config.validate().expect("Default configuration should validate.");
		assert_eq!(config.state_ttl, Duration::seconds(600));
		assert_eq!(config.credential_ttl_ceiling, Duration::seconds(600));
		assert_eq!(config.handoff, HandoffPolicy::SingleUse);
	}

	#[test]
	fn validation_rejects_bad_settings() {
		assert!(matches!(
			base().with_state_ttl(Duration::minutes(11)).validate(),
			Err(ConfigError::StateTtlOutOfRange)
		));
		assert!(matches!(
			base().with_state_ttl(Duration::ZERO).validate(),
			Err(ConfigError::StateTtlOutOfRange)
		));
		assert!(matches!(
			base().with_scopes(["crm read"]).validate(),
			Err(ConfigError::InvalidScope { .. })
		));
		assert!(matches!(
			base().with_credential_ttl_ceiling(Duration::seconds(-1)).validate(),
			Err(ConfigError::NonPositiveDuration { .. })
		));

		assert!(matches!(
			base().with_credential_ttl_ceiling(Duration::seconds(i64::MAX)).validate(),
			Err(ConfigError::DurationTooLong { setting: "credential TTL ceiling", .. })
		));
		assert!(matches!(
			base().with_exchange_timeout(Duration::hours(1)).validate(),
			Err(ConfigError::DurationTooLong { setting: "exchange timeout", .. })
		));
		let huge_backoff = RetryPolicy { max_attempts: 3, backoff: Duration::seconds(i64::MAX) };

		assert!(matches!(
			base().with_store_retry(huge_backoff).validate(),
			Err(ConfigError::InvalidSetting { .. })
		));
		base()
			.with_credential_ttl_ceiling(MAX_CREDENTIAL_TTL)
			.with_exchange_timeout(MAX_EXCHANGE_TIMEOUT)
			.validate()
			.expect("Bounds themselves should be accepted.");

		let mut insecure = base();

		insecure.redirect_uri =
			Url::parse("http://app.example.com/callback").expect("Redirect fixture should parse.");

		assert!(matches!(insecure.validate(), Err(ConfigError::InsecureRedirect { .. })));
	}

	#[test]
	fn from_lookup_reads_prefixed_keys() {
		let config = ClientConfig::from_lookup(
			"HUBSPOT",
			lookup(&[
				("HUBSPOT_CLIENT_ID", "id"),
				("HUBSPOT_CLIENT_SECRET", "secret"),
				(
					"HUBSPOT_REDIRECT_URI",
					"http://localhost:8000/integrations/hubspot/oauth2callback",
				),
				("HUBSPOT_SCOPES", "oauth, crm.objects.contacts.read content"),
				("HUBSPOT_STATE_TTL_SECS", "120"),
				("HUBSPOT_HANDOFF", "expiry_only"),
			]),
		)
		.expect("Configuration should load.");

		assert_eq!(config.client_id, "id");
		assert_eq!(config.client_secret.expose(), "secret");
		assert_eq!(config.scopes, ["oauth", "crm.objects.contacts.read", "content"]);
		assert_eq!(config.state_ttl, Duration::seconds(120));
		assert_eq!(config.handoff, HandoffPolicy::ExpiryOnly);
	}

	#[test]
	fn from_lookup_reports_missing_and_invalid_keys() {
		let missing = ClientConfig::from_lookup("X", lookup(&[("X_CLIENT_ID", "id")]));

		match missing {
			Err(ConfigError::MissingSetting { key }) => assert_eq!(key, "X_CLIENT_SECRET"),
			other => panic!("Unexpected result: {other:?}."),
		}

		let invalid = ClientConfig::from_lookup(
			"X",
			lookup(&[
				("X_CLIENT_ID", "id"),
				("X_CLIENT_SECRET", "secret"),
				("X_REDIRECT_URI", "https://app.example.com/cb"),
				("X_STATE_TTL_SECS", "ten"),
			]),
		);

		match invalid {
			Err(ConfigError::InvalidSetting { key, .. }) => assert_eq!(key, "X_STATE_TTL_SECS"),
			other => panic!("Unexpected result: {other:?}."),
		}
	}

	#[test]
	fn oversized_env_ceiling_is_rejected() {
		let err = ClientConfig::from_lookup(
			"X",
			lookup(&[
				("X_CLIENT_ID", "id"),
				("X_CLIENT_SECRET", "secret"),
				("X_REDIRECT_URI", "https://app.example.com/cb"),
				("X_CREDENTIAL_TTL_SECS", "9223372036854775807"),
			]),
		)
		.expect_err("Ceiling beyond one day should be rejected.");

		assert!(matches!(
			err,
			ConfigError::DurationTooLong { max, .. } if max == Duration::days(1)
		));
	}

	#[test]
	fn deserializes_with_defaults() {
		let config: ClientConfig = serde_json::from_str(
			r#"{
				"client_id": "id",
				"client_secret": "secret",
				"redirect_uri": "https://app.example.com/cb",
				"state_ttl": 300,
				"handoff": "expiry_only",
				"store_retry": { "max_attempts": 5, "backoff": 250 }
			}"#,
		)
		.expect("Configuration should deserialize.");

		assert_eq!(config.state_ttl, Duration::seconds(300));
		assert_eq!(config.exchange_timeout, DEFAULT_EXCHANGE_TIMEOUT);
		assert_eq!(config.handoff, HandoffPolicy::ExpiryOnly);
		assert_eq!(config.store_retry.max_attempts, 5);
		assert_eq!(config.store_retry.backoff, Duration::milliseconds(250));
		config.validate().expect("Deserialized configuration should validate.");
	}
}
