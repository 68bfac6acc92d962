//! Provider descriptor data structures and helpers shared by all flows.
//!
//! The module exposes validated metadata and its builder so providers can describe their
//! endpoints and quirks in a transport-agnostic way.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Consent page the end user is redirected to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier; also the prefix of every store key for this provider.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// How the client authenticates at the token endpoint.
	pub client_auth: ClientAuthMethod,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Returns `true` when authorization requests must carry a PKCE challenge.
	pub fn requires_pkce(&self) -> bool {
		self.quirks.pkce_required
	}

	/// Joins scopes with the provider's delimiter; `None` when no scope is requested.
	pub fn scope_param<S>(&self, scopes: &[S]) -> Option<String>
	where
		S: AsRef<str>,
	{
		if scopes.is_empty() {
			return None;
		}

		let delimiter = self.quirks.scope_delimiter.to_string();

		Some(scopes.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(&delimiter))
	}
}
