//! Provider descriptors (data) and ready-made presets.
//!
//! `descriptor` exposes validated metadata ([`ProviderDescriptor`]) covering HTTPS-only
//! endpoints, the token endpoint's client authentication method, and provider quirks
//! (PKCE requirement, scope delimiter, extra authorize parameters). `presets` ships
//! descriptors for HubSpot, Airtable, and Notion.

pub mod descriptor;
pub mod presets;

pub use descriptor::*;
