// std
use std::{
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use time::Duration;
// self
use integration_gateway::{
	auth::{OrgId, UserId},
	config::ClientConfig,
	error::{Error, ExchangeError},
	flows::{CallbackParams, Gateway},
	http::TokenHttpClient,
	oauth::oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	provider::presets,
	store::MemoryStore,
	url::Url,
};

#[derive(Debug)]
enum FakeTransportError {
	ConnectionReset,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::ConnectionReset => write!(f, "Connection reset."),
		}
	}
}
impl std::error::Error for FakeTransportError {}

#[derive(Clone, Copy, Debug)]
enum Behavior {
	Succeed,
	Fail,
	Stall,
}

#[derive(Clone, Debug)]
struct FakeHttpClient {
	behavior: Behavior,
	handles: Arc<AtomicUsize>,
}
impl FakeHttpClient {
	fn new(behavior: Behavior) -> Self {
		Self { behavior, handles: Default::default() }
	}
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn handle(&self) -> Self::Handle {
		self.handles.fetch_add(1, Ordering::SeqCst);

		FakeHttpHandle { behavior: self.behavior }
	}
}

struct FakeHttpHandle {
	behavior: Behavior,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let behavior = self.behavior;

		Box::pin(async move {
			match behavior {
				Behavior::Succeed => {
					let body = String::from_utf8_lossy(request.body()).into_owned();

					assert!(body.contains("code=custom-code"), "Unexpected token request: {body}.");

					Ok(HttpResponse::new(b"{\"access_token\":\"custom-token\"}".to_vec()))
				},
				Behavior::Fail =>
					Err(HttpClientError::Reqwest(Box::new(FakeTransportError::ConnectionReset))),
				Behavior::Stall => {
					tokio::time::sleep(std::time::Duration::from_secs(5)).await;

					Ok(HttpResponse::new(Vec::new()))
				},
			}
		})
	}
}

fn gateway(client: FakeHttpClient) -> Gateway<FakeHttpClient> {
	let config = ClientConfig::new(
		"client",
		"secret",
		Url::parse("https://app.example.com/callback").expect("Redirect URI should parse."),
	)
	.with_exchange_timeout(Duration::milliseconds(50));

	Gateway::with_http_client(
		Arc::new(MemoryStore::default()),
		presets::notion().expect("Preset should build."),
		config,
		client,
	)
	.expect("Gateway should build with a custom transport.")
}

async fn callback(gateway: &Gateway<FakeHttpClient>) -> Result<String, Error> {
	let user = UserId::new("user-1").expect("User identifier should be valid.");
	let org = OrgId::new("org-1").expect("Organization identifier should be valid.");
	let start = gateway
		.begin_authorization(&user, &org)
		.await
		.expect("Authorization should start successfully.");
	let params = CallbackParams {
		code: Some("custom-code".into()),
		state: Some(start.state.to_string()),
		..Default::default()
	};

	gateway.handle_callback(params).await.map(|record| record.access_token().to_owned())
}

#[tokio::test]
async fn custom_transport_drives_the_exchange() {
	let client = FakeHttpClient::new(Behavior::Succeed);
	let gateway = gateway(client.clone());

	assert_eq!(callback(&gateway).await.expect("Exchange should succeed."), "custom-token");
	assert_eq!(client.handles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_failures_map_to_exchange_errors() {
	let gateway = gateway(FakeHttpClient::new(Behavior::Fail));
	let err = callback(&gateway).await.expect_err("Transport failure should surface.");

	assert!(matches!(err, Error::TokenExchangeFailed(ExchangeError::Transport { .. })), "{err:?}");
	assert!(err.is_user_visible());
}

#[tokio::test]
async fn stalled_token_endpoint_times_out() {
	let gateway = gateway(FakeHttpClient::new(Behavior::Stall));
	let err = callback(&gateway).await.expect_err("Stalled exchange should time out.");

	assert!(
		matches!(err, Error::TokenExchangeFailed(ExchangeError::Timeout { after })
			if after == Duration::milliseconds(50)),
		"{err:?}"
	);
}
