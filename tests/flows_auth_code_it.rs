#![cfg(feature = "reqwest")]

// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::prelude::*;
// self
use integration_gateway::{
	auth::{OrgId, ProviderId, UserId},
	config::ClientConfig,
	error::{Error, ExchangeError},
	flows::{CallbackParams, Gateway, ReqwestGateway},
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderQuirks},
	store::MemoryStore,
	url::Url,
};

const CLIENT_ID: &str = "client-it";
const CLIENT_SECRET: &str = "secret-it";

fn descriptor(
	server: &MockServer,
	client_auth: ClientAuthMethod,
	pkce: bool,
) -> ProviderDescriptor {
	let provider_id =
		ProviderId::new("mock-http").expect("Provider identifier should be valid for the test.");

	ProviderDescriptor::builder(provider_id)
		.endpoints(&server.url("/authorize"), &server.url("/token"))
		.expect("Mock endpoints should parse successfully.")
		.client_auth(client_auth)
		.quirks(ProviderQuirks { pkce_required: pkce, ..Default::default() })
		.build()
		.expect("Provider descriptor should build successfully.")
}

fn gateway(descriptor: ProviderDescriptor) -> ReqwestGateway {
	let config = ClientConfig::new(
		CLIENT_ID,
		CLIENT_SECRET,
		Url::parse("https://app.example.com/oauth/callback")
			.expect("Redirect URI should parse successfully."),
	)
	.with_scopes(["contacts.read", "oauth"]);

	Gateway::new(Arc::new(MemoryStore::default()), descriptor, config)
		.expect("Gateway should build successfully.")
}

fn identity() -> (UserId, OrgId) {
	(
		UserId::new("user-456").expect("User identifier should be valid for the test."),
		OrgId::new("org-123").expect("Organization identifier should be valid for the test."),
	)
}

async fn redirect_with_code(gateway: &ReqwestGateway, code: &str) -> CallbackParams {
	let (user, org) = identity();
	let start = gateway
		.begin_authorization(&user, &org)
		.await
		.expect("Authorization should start successfully.");
	let pairs: HashMap<_, _> = start.authorize_url.query_pairs().into_owned().collect();
	let redirect = format!(
		"https://app.example.com/oauth/callback?code={code}&state={}",
		pairs["state"]
	);

	CallbackParams::from_url(&Url::parse(&redirect).expect("Redirect should parse successfully."))
}

#[tokio::test]
async fn callback_exchanges_code_and_hands_credentials_off_once() {
	let server = MockServer::start_async().await;
	let gateway = gateway(descriptor(&server, ClientAuthMethod::ClientSecretPost, false));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"tok123\",\"expires_in\":3600,\"hub_domain\":\"x.io\"}");
		})
		.await;
	let params = redirect_with_code(&gateway, "valid-code").await;
	let response = gateway.complete_callback(params).await;

	mock.assert_async().await;

	assert_eq!(response.status, 200);
	assert!(response.body.contains("window.close()"));

	let (user, org) = identity();
	let record = gateway
		.require_credentials(&user, &org)
		.await
		.expect("Credentials should be handed off.");

	assert_eq!(record.access_token(), "tok123");
	assert_eq!(record.expires_in().map(|ttl| ttl.whole_seconds()), Some(3600));
	assert_eq!(record.get("hub_domain").and_then(|v| v.as_str()), Some("x.io"));
	assert!(
		gateway
			.fetch_credentials(&user, &org)
			.await
			.expect("Second fetch should succeed.")
			.is_none()
	);
}

#[tokio::test]
async fn rejected_exchange_leaves_nothing_stored() {
	let server = MockServer::start_async().await;
	let gateway = gateway(descriptor(&server, ClientAuthMethod::ClientSecretPost, false));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"already used\"}");
		})
		.await;
	let params = redirect_with_code(&gateway, "stale-code").await;
	let err = gateway
		.handle_callback(params.clone())
		.await
		.expect_err("Rejected exchange should surface as an error.");

	mock.assert_async().await;

	match err {
		Error::TokenExchangeFailed(ExchangeError::Rejected { status, error, .. }) => {
			assert_eq!(status, 400);
			assert_eq!(error.as_deref(), Some("invalid_grant"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	let (user, org) = identity();

	assert!(matches!(gateway.require_credentials(&user, &org).await, Err(Error::NoCredentials)));
	// The state was consumed by the first attempt.
	assert!(matches!(gateway.handle_callback(params).await, Err(Error::InvalidState)));
}

#[tokio::test]
async fn pkce_provider_authenticates_with_basic_auth() {
	let server = MockServer::start_async().await;
	let gateway = gateway(descriptor(&server, ClientAuthMethod::ClientSecretBasic, true));
	let basic = format!("Basic {}", STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}")));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").header("authorization", basic.as_str());
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"pkce-token\",\"refresh_token\":\"r1\"}");
		})
		.await;
	let params = redirect_with_code(&gateway, "pkce-code").await;
	let record = gateway.handle_callback(params).await.expect("PKCE exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(record.access_token(), "pkce-token");
	assert_eq!(record.refresh_token(), Some("r1"));
}

#[tokio::test]
async fn consent_url_targets_the_authorization_endpoint() {
	let server = MockServer::start_async().await;
	let gateway = gateway(descriptor(&server, ClientAuthMethod::ClientSecretBasic, true));
	let (user, org) = identity();
	let start = gateway
		.begin_authorization(&user, &org)
		.await
		.expect("Authorization should start successfully.");
	let pairs: HashMap<_, _> = start.authorize_url.query_pairs().into_owned().collect();

	assert_eq!(start.authorize_url.path(), "/authorize");
	assert_eq!(pairs.get("client_id").map(String::as_str), Some(CLIENT_ID));
	assert_eq!(pairs.get("scope").map(String::as_str), Some("contacts.read oauth"));
	assert_eq!(pairs.get("code_challenge_method").map(String::as_str), Some("S256"));
	assert_eq!(pairs.get("state").map(String::as_str), Some(start.state.as_str()));
}
