//! Walks a HubSpot-style authorization end to end against a local mock token endpoint.
//!
//! 1. Start the flow for an org/user pair and print the consent URL.
//! 2. Simulate the browser redirect back to the registered callback.
//! 3. Hand the stored credentials to the application exactly once.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use integration_gateway::{
	auth::{OrgId, ProviderId, UserId},
	config::ClientConfig,
	flows::{CALLBACK_CONTENT_TYPE, CallbackParams, Gateway},
	provider::{ClientAuthMethod, ProviderDescriptor, presets::HUBSPOT_SCOPES},
	store::{KvStore, MemoryStore},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v1/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"expires_in\":1800}",
			);
		})
		.await;
	let descriptor = ProviderDescriptor::builder(ProviderId::new("hubspot")?)
		.endpoints(&server.url("/oauth/authorize"), &server.url("/oauth/v1/token"))?
		.client_auth(ClientAuthMethod::ClientSecretPost)
		.build()?;
	let config = ClientConfig::new(
		"demo-client",
		"demo-secret",
		Url::parse("http://localhost:8000/integrations/hubspot/oauth2callback")?,
	)
	.with_scopes(HUBSPOT_SCOPES);
	let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
	let gateway = Gateway::new(store, descriptor, config)?;
	let user = UserId::new("demo-user")?;
	let org = OrgId::new("demo-org")?;
	let start = gateway.begin_authorization(&user, &org).await?;

	println!("Send the user to: {}", start.authorize_url);

	let redirect = Url::parse(&format!(
		"http://localhost:8000/integrations/hubspot/oauth2callback?code=demo-code&state={}",
		start.state
	))?;
	let response = gateway.complete_callback(CallbackParams::from_url(&redirect)).await;

	println!("Callback answered {} ({CALLBACK_CONTENT_TYPE}).", response.status);

	token_mock.assert_async().await;

	let credentials = gateway.require_credentials(&user, &org).await?;

	println!("Handed off credentials: {credentials:?}");

	match gateway.require_credentials(&user, &org).await {
		Ok(_) => println!("Unexpected second handoff."),
		Err(e) => println!("Second fetch: {e}"),
	}

	Ok(())
}
