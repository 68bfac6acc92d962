//! High-level flow orchestrators: authorization start, callback handling, and handoff.

pub mod authorize;
pub mod callback;
pub mod handoff;

pub use authorize::*;
pub use callback::*;
pub use handoff::*;

// self
use crate::{
	_prelude::*,
	auth::{OrgId, UserId},
	config::ClientConfig,
	http::TokenHttpClient,
	oauth::ExchangeFacade,
	provider::ProviderDescriptor,
	store::{KvStore, RetryingStore, StoreKey},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestHttpClient>;

/// Drives OAuth 2.0 authorization-code integrations against a single provider.
///
/// The gateway owns the HTTP client, the (retry-wrapped) store, the provider descriptor,
/// and the validated client configuration, so each flow only deals with its own step.
/// One gateway serves any number of concurrent identities.
pub struct Gateway<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// HTTP client wrapper used for every token endpoint call.
	pub http_client: Arc<C>,
	/// Ephemeral store holding pending states and exchanged credentials.
	pub store: Arc<dyn KvStore>,
	/// Provider descriptor that defines endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	config: ClientConfig,
	facade: ExchangeFacade<C>,
}
impl<C> Gateway<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a gateway that reuses the caller-provided transport.
	///
	/// Fails fast when the configuration is invalid. The store is wrapped in a
	/// [`RetryingStore`] driven by [`ClientConfig::store_retry`].
	pub fn with_http_client(
		store: Arc<dyn KvStore>,
		descriptor: ProviderDescriptor,
		config: ClientConfig,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		config.validate()?;

		let http_client = http_client.into();
		let store: Arc<dyn KvStore> = Arc::new(RetryingStore::new(store, config.store_retry));
		let facade = ExchangeFacade::new(&descriptor, &config, http_client.clone());

		Ok(Self { http_client, store, descriptor, config, facade })
	}

	/// Validated client configuration the gateway was built with.
	///
	/// Read-only: the exchange side keeps its own copy of the client credentials, redirect
	/// URI, and timeout, so both halves of the flow always agree.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	pub(crate) fn state_key(&self, org_id: &OrgId, user_id: &UserId) -> StoreKey {
		StoreKey::state(&self.descriptor.id, org_id, user_id)
	}

	pub(crate) fn credentials_key(&self, org_id: &OrgId, user_id: &UserId) -> StoreKey {
		StoreKey::credentials(&self.descriptor.id, org_id, user_id)
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestHttpClient> {
	/// Creates a gateway with its own reqwest transport.
	///
	/// The transport never follows redirects and applies [`ClientConfig::exchange_timeout`]
	/// to every request.
	pub fn new(
		store: Arc<dyn KvStore>,
		descriptor: ProviderDescriptor,
		config: ClientConfig,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.exchange_timeout)?;

		Self::with_http_client(store, descriptor, config, http_client)
	}
}
impl<C> Debug for Gateway<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("descriptor", &self.descriptor)
			.field("config", &self.config)
			.field("atomic_take", &self.store.atomic_take())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
pub(crate) mod testing {
	// std
	use std::{
		io,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode};
	// self
	use super::*;
	use crate::store::{MemoryStore, RetryPolicy};

	/// Token endpoint double that answers every request with the same response.
	#[derive(Clone, Debug)]
	pub(crate) struct StaticEndpoint {
		status: u16,
		body: &'static str,
		calls: Arc<AtomicUsize>,
	}
	impl StaticEndpoint {
		pub(crate) fn new(status: u16, body: &'static str) -> Self {
			Self { status, body, calls: Default::default() }
		}

		pub(crate) fn ok(body: &'static str) -> Self {
			Self::new(200, body)
		}

		pub(crate) fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl TokenHttpClient for StaticEndpoint {
		type Handle = StaticEndpoint;
		type TransportError = io::Error;

		fn handle(&self) -> Self::Handle {
			self.clone()
		}
	}
	impl<'c> AsyncHttpClient<'c> for StaticEndpoint {
		type Error = HttpClientError<io::Error>;
		type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

		fn call(&'c self, _: HttpRequest) -> Self::Future {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				let mut response = HttpResponse::new(self.body.as_bytes().to_vec());

				*response.status_mut() = StatusCode::from_u16(self.status)
					.map_err(|e| HttpClientError::Other(e.to_string()))?;

				Ok(response)
			})
		}
	}

	pub(crate) fn config() -> ClientConfig {
		ClientConfig::new(
			"client-id",
			"client-secret",
			Url::parse("https://app.example.com/oauth/callback")
				.expect("Redirect fixture should parse."),
		)
		.with_store_retry(RetryPolicy::none())
	}

	/// Builds an in-memory gateway and returns the endpoint double for call assertions.
	pub(crate) fn gateway(
		descriptor: ProviderDescriptor,
		endpoint: StaticEndpoint,
	) -> (Gateway<StaticEndpoint>, StaticEndpoint) {
		gateway_with(descriptor, config(), endpoint)
	}

	/// Same as [`gateway`] with a caller-tuned configuration.
	pub(crate) fn gateway_with(
		descriptor: ProviderDescriptor,
		config: ClientConfig,
		endpoint: StaticEndpoint,
	) -> (Gateway<StaticEndpoint>, StaticEndpoint) {
		let gateway = Gateway::with_http_client(
			Arc::new(MemoryStore::default()),
			descriptor,
			config,
			endpoint.clone(),
		)
		.expect("Gateway fixture should build.");

		(gateway, endpoint)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::{testing::StaticEndpoint, *};
	use crate::{error::ConfigError, provider::presets, store::MemoryStore};

	#[test]
	fn invalid_config_is_rejected_at_construction() {
		let config = testing::config().with_state_ttl(Duration::minutes(30));
		let err = Gateway::with_http_client(
			Arc::new(MemoryStore::default()),
			presets::hubspot().expect("Preset should build."),
			config,
			StaticEndpoint::ok("{}"),
		)
		.expect_err("State TTL above the cap should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::StateTtlOutOfRange)), "{err:?}");
	}

	#[tokio::test]
	async fn consent_url_and_exchange_share_the_construction_config() {
		let (gateway, endpoint) = testing::gateway_with(
			presets::hubspot().expect("Preset should build."),
			testing::config().with_state_ttl(Duration::minutes(5)),
			StaticEndpoint::ok("{\"access_token\":\"tok\"}"),
		);
		let user = UserId::new("user-1").expect("User fixture should be valid.");
		let org = OrgId::new("org-1").expect("Organization fixture should be valid.");
		let start = gateway.begin_authorization(&user, &org).await.expect("Start should succeed.");
		let redirect = start
			.authorize_url
			.query_pairs()
			.find(|(name, _)| name == "redirect_uri")
			.map(|(_, value)| value.into_owned());

		assert_eq!(gateway.config().state_ttl, Duration::minutes(5));
		assert_eq!(redirect.as_deref(), Some(gateway.config().redirect_uri.as_str()));

		gateway
			.handle_callback(CallbackParams {
				code: Some("code".into()),
				state: Some(start.state.to_string()),
				..Default::default()
			})
			.await
			.expect("Callback should succeed with the construction config.");

		assert_eq!(endpoint.calls(), 1);
	}

	#[test]
	fn keys_are_namespaced_by_provider() {
		let (gateway, _) = testing::gateway(
			presets::airtable().expect("Preset should build."),
			StaticEndpoint::ok("{}"),
		);
		let org = OrgId::new("org-1").expect("Organization fixture should be valid.");
		let user = UserId::new("user-1").expect("User fixture should be valid.");

		assert_eq!(gateway.state_key(&org, &user).to_string(), "airtable_state:org-1:user-1");
		assert_eq!(
			gateway.credentials_key(&org, &user).to_string(),
			"airtable_credentials:org-1:user-1"
		);
	}
}
