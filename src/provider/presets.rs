//! Descriptors for the providers the gateway integrates out of the box.
//!
//! | Provider | Client auth | PKCE | Extra authorize params |
//! |----------|-------------|------|------------------------|
//! | HubSpot  | body        | no   | none                   |
//! | Airtable | Basic       | S256 | none                   |
//! | Notion   | Basic       | no   | `owner=user`           |

// self
use crate::{
	auth::ProviderId,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderDescriptorError, ProviderQuirks},
};

/// Default HubSpot scopes for CRM contact and company access.
pub const HUBSPOT_SCOPES: [&str; 7] = [
	"crm.objects.contacts.read",
	"crm.objects.contacts.write",
	"automation",
	"content",
	"oauth",
	"crm.objects.companies.read",
	"crm.objects.companies.write",
];
/// Default Airtable scopes for record, comment, and schema access.
pub const AIRTABLE_SCOPES: [&str; 6] = [
	"data.records:read",
	"data.records:write",
	"data.recordComments:read",
	"data.recordComments:write",
	"schema.bases:read",
	"schema.bases:write",
];

/// HubSpot: credentials in the request body, no PKCE.
pub fn hubspot() -> Result<ProviderDescriptor, ProviderDescriptorError> {
	ProviderDescriptor::builder(ProviderId::new("hubspot")?)
		.endpoints(
			"https://app.hubspot.com/oauth/authorize",
			"https://api.hubapi.com/oauth/v1/token",
		)?
		.client_auth(ClientAuthMethod::ClientSecretPost)
		.build()
}

/// Airtable: HTTP Basic client authentication and mandatory PKCE.
pub fn airtable() -> Result<ProviderDescriptor, ProviderDescriptorError> {
	ProviderDescriptor::builder(ProviderId::new("airtable")?)
		.endpoints(
			"https://airtable.com/oauth2/v1/authorize",
			"https://airtable.com/oauth2/v1/token",
		)?
		.client_auth(ClientAuthMethod::ClientSecretBasic)
		.quirks(ProviderQuirks { pkce_required: true, ..Default::default() })
		.build()
}

/// Notion: HTTP Basic client authentication and `owner=user` on the consent URL.
pub fn notion() -> Result<ProviderDescriptor, ProviderDescriptorError> {
	ProviderDescriptor::builder(ProviderId::new("notion")?)
		.endpoints(
			"https://api.notion.com/v1/oauth/authorize",
			"https://api.notion.com/v1/oauth/token",
		)?
		.client_auth(ClientAuthMethod::ClientSecretBasic)
		.quirks(ProviderQuirks::default().with_authorize_param("owner", "user"))
		.build()
}
