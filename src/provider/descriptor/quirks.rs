// self
use crate::_prelude::*;

/// Provider-specific quirks that influence how flows behave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Indicates whether PKCE (S256) must accompany every authorization request.
	pub pkce_required: bool,
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
	/// Extra query parameters the provider expects on the consent URL.
	pub authorize_params: Vec<(String, String)>,
}
impl ProviderQuirks {
	/// Adds an extra authorization query parameter.
	pub fn with_authorize_param(
		mut self,
		name: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.authorize_params.push((name.into(), value.into()));

		self
	}
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { pkce_required: false, scope_delimiter: ' ', authorize_params: Vec::new() }
	}
}
