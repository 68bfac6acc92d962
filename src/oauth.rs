//! Authorization-code exchange against a provider token endpoint.
//!
//! The exchange is assembled by hand on top of the `oauth2` crate's HTTP types instead of
//! its typed token client: provider payloads are kept verbatim, and some providers omit
//! fields (`token_type`) the typed client insists on.

pub use oauth2;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	AsyncHttpClient, ClientId, ClientSecret, HttpClientError, HttpRequest, HttpResponse,
	RedirectUrl, TokenUrl,
	http::{
		HeaderValue, Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde_json::{Map, Value};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::CredentialRecord,
	config::ClientConfig,
	error::ExchangeError,
	http::TokenHttpClient,
	provider::{ClientAuthMethod, ProviderDescriptor},
};

/// Content type of every token request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ExchangeError>> + 'a + Send>>;

/// OAuth error body fields, parsed best-effort from rejected exchanges.
#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
	error: Option<String>,
	error_description: Option<String>,
}

/// Token-endpoint client bound to one provider and one set of client credentials.
pub(crate) struct ExchangeFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	token_url: TokenUrl,
	client_id: ClientId,
	client_secret: ClientSecret,
	redirect_uri: RedirectUrl,
	client_auth: ClientAuthMethod,
	timeout: Duration,
	http_client: Arc<C>,
}
impl<C> ExchangeFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	pub(crate) fn new(
		descriptor: &ProviderDescriptor,
		config: &ClientConfig,
		http_client: Arc<C>,
	) -> Self {
		Self {
			token_url: TokenUrl::from_url(descriptor.endpoints.token.clone()),
			client_id: ClientId::new(config.client_id.clone()),
			client_secret: ClientSecret::new(config.client_secret.expose().to_owned()),
			redirect_uri: RedirectUrl::from_url(config.redirect_uri.clone()),
			client_auth: descriptor.client_auth,
			timeout: config.exchange_timeout,
			http_client,
		}
	}

	/// Exchanges `code` for credentials, attaching `code_verifier` when PKCE is in use.
	pub(crate) fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		code_verifier: Option<&'a str>,
	) -> ExchangeFuture<'a, CredentialRecord> {
		Box::pin(async move {
			let request = self.build_request(code, code_verifier)?;
			let handle = self.http_client.handle();
			let response = tokio::time::timeout(self.timeout.unsigned_abs(), handle.call(request))
				.await
				.map_err(|_| ExchangeError::Timeout { after: self.timeout })?
				.map_err(map_transport_error)?;

			parse_token_response(&response)
		})
	}

	fn build_request(
		&self,
		code: &str,
		code_verifier: Option<&str>,
	) -> Result<HttpRequest, ExchangeError> {
		let mut form = form_urlencoded::Serializer::new(String::new());

		form.append_pair("grant_type", "authorization_code")
			.append_pair("code", code)
			.append_pair("redirect_uri", self.redirect_uri.as_str());

		if let Some(verifier) = code_verifier {
			form.append_pair("code_verifier", verifier);
		}

		let mut builder = Request::builder()
			.method(Method::POST)
			.uri(self.token_url.as_str())
			.header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
			.header(ACCEPT, HeaderValue::from_static("application/json"));

		match self.client_auth {
			ClientAuthMethod::ClientSecretBasic => {
				builder = builder.header(AUTHORIZATION, self.basic_authorization());
			},
			ClientAuthMethod::ClientSecretPost => {
				form.append_pair("client_id", self.client_id.as_str())
					.append_pair("client_secret", self.client_secret.secret());
			},
		}

		Ok(builder.body(form.finish().into_bytes())?)
	}

	// RFC 6749 §2.3.1: both halves are form-encoded before base64.
	fn basic_authorization(&self) -> String {
		let id: String = form_urlencoded::byte_serialize(self.client_id.as_bytes()).collect();
		let secret: String =
			form_urlencoded::byte_serialize(self.client_secret.secret().as_bytes()).collect();

		format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
	}
}
impl<C> Debug for ExchangeFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeFacade")
			.field("token_url", &self.token_url.as_str())
			.field("client_id", &self.client_id.as_str())
			.field("client_auth", &self.client_auth)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

fn map_transport_error<E>(err: HttpClientError<E>) -> ExchangeError
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Http(inner) => ExchangeError::InvalidRequest(inner),
		other => ExchangeError::transport(other),
	}
}

fn parse_token_response(response: &HttpResponse) -> Result<CredentialRecord, ExchangeError> {
	let status = response.status();

	if !status.is_success() {
		let body: OAuthErrorBody = serde_json::from_slice(response.body()).unwrap_or_default();

		return Err(ExchangeError::Rejected {
			status: status.as_u16(),
			error: body.error,
			description: body.error_description,
		});
	}

	let mut de = serde_json::Deserializer::from_slice(response.body());
	let payload: Map<String, Value> = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| ExchangeError::MalformedResponse { source })?;

	Ok(CredentialRecord::from_payload(payload)?)
}
