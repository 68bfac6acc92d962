// std
use std::net::IpAddr;
// crates.io
use url::Host;
// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ProviderId},
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints, ProviderQuirks},
};

/// Parameters the gateway always sets itself on the consent URL.
pub const RESERVED_AUTHORIZE_PARAMS: [&str; 7] = [
	"client_id",
	"redirect_uri",
	"scope",
	"response_type",
	"state",
	"code_challenge",
	"code_challenge_method",
];

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoint string could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
	/// Descriptor identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
	/// Extra authorize parameters may not override gateway-owned ones.
	#[error("Authorize parameter `{name}` is reserved.")]
	ReservedAuthorizeParam {
		/// Offending parameter name.
		name: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Consent endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for the code exchange.
	pub token_endpoint: Option<Url>,
	/// Client authentication method for the token endpoint.
	pub client_auth: ClientAuthMethod,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			client_auth: ClientAuthMethod::default(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Parses and sets both endpoints from strings.
	pub fn endpoints(
		self,
		authorization: &str,
		token: &str,
	) -> Result<Self, ProviderDescriptorError> {
		let authorization = Url::parse(authorization).map_err(|source| {
			ProviderDescriptorError::InvalidEndpoint { endpoint: "authorization", source }
		})?;
		let token = Url::parse(token).map_err(|source| {
			ProviderDescriptorError::InvalidEndpoint { endpoint: "token", source }
		})?;

		Ok(self.authorization_endpoint(authorization).token_endpoint(token))
	}

	/// Overrides the client authentication method.
	pub fn client_auth(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth = method;

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization, token },
			client_auth: self.client_auth,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_scope_delimiter(self.quirks.scope_delimiter)?;

		for (name, _) in &self.quirks.authorize_params {
			if RESERVED_AUTHORIZE_PARAMS.contains(&name.as_str()) {
				return Err(ProviderDescriptorError::ReservedAuthorizeParam { name: name.clone() });
			}
		}

		Ok(())
	}
}

/// Returns `true` for `https` URLs and for `http` URLs that point at a loopback host.
pub fn is_https_or_loopback(url: &Url) -> bool {
	match url.scheme() {
		"https" => true,
		"http" => match url.host() {
			Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
			Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
			Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
			None => false,
		},
		_ => false,
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if is_https_or_loopback(url) {
		Ok(())
	} else {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn validate_scope_delimiter(delimiter: char) -> Result<(), ProviderDescriptorError> {
	if delimiter.is_control() {
		Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn loopback_http_is_accepted() {
		let accepted =
			["https://example.com", "http://localhost:8080", "http://127.0.0.1", "http://[::1]"];

		for raw in accepted {
			let url = Url::parse(raw).expect("Fixture URL should parse.");

			assert!(is_https_or_loopback(&url), "{raw} should be accepted.");
		}
		for raw in ["http://example.com", "ftp://localhost", "http://10.0.0.1"] {
			let url = Url::parse(raw).expect("Fixture URL should parse.");

			assert!(!is_https_or_loopback(&url), "{raw} should be rejected.");
		}
	}

	#[test]
	fn endpoints_reports_parse_failures() {
		let id = ProviderId::new("p").expect("Provider should be valid.");
		let builder = ProviderDescriptorBuilder::new(id);

		assert!(matches!(
			builder.endpoints("not a url", "https://example.com/token"),
			Err(ProviderDescriptorError::InvalidEndpoint { endpoint: "authorization", .. })
		));
	}
}
