//! Opaque credential payloads returned by provider token endpoints.
//!
//! Providers disagree on token response shapes (Notion adds workspace metadata, HubSpot
//! omits `scope`, Airtable adds `refresh_expires_in`), so the payload is kept verbatim as a
//! JSON object. Only `access_token` and `expires_in` are interpreted.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

const REDACTED_FIELDS: [&str; 3] = ["access_token", "refresh_token", "id_token"];

/// Errors raised when a payload cannot serve as credentials.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// `access_token` is missing, empty, or not a string.
	#[error("Token payload has no usable access_token.")]
	MissingAccessToken,
}

/// Raw token payload returned by a provider, preserved field for field.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct CredentialRecord(Map<String, Value>);
impl CredentialRecord {
	/// Wraps a provider payload after checking it carries an access token.
	pub fn from_payload(payload: Map<String, Value>) -> Result<Self, CredentialError> {
		match payload.get("access_token") {
			Some(Value::String(token)) if !token.is_empty() => Ok(Self(payload)),
			_ => Err(CredentialError::MissingAccessToken),
		}
	}

	/// Access token. Callers must avoid logging it.
	pub fn access_token(&self) -> &str {
		self.str_field("access_token").unwrap_or_default()
	}

	/// Refresh token, if the provider issued one.
	pub fn refresh_token(&self) -> Option<&str> {
		self.str_field("refresh_token")
	}

	/// Token type hint (`bearer` for every supported provider).
	pub fn token_type(&self) -> Option<&str> {
		self.str_field("token_type")
	}

	/// Granted scope string, when echoed by the provider.
	pub fn scope(&self) -> Option<&str> {
		self.str_field("scope")
	}

	/// Provider-declared lifetime. Accepts JSON numbers and numeric strings.
	pub fn expires_in(&self) -> Option<Duration> {
		let seconds = match self.0.get("expires_in")? {
			Value::Number(number) => number.as_i64()?,
			Value::String(text) => text.trim().parse().ok()?,
			_ => return None,
		};

		Some(Duration::seconds(seconds))
	}

	/// Storage TTL: the provider's positive `expires_in` capped at `ceiling`, else `ceiling`.
	pub fn ttl(&self, ceiling: Duration) -> Duration {
		match self.expires_in() {
			Some(declared) if declared.is_positive() => declared.min(ceiling),
			_ => ceiling,
		}
	}

	/// Looks up any field of the raw payload.
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	/// Borrows the raw payload.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	/// Consumes the record, returning the raw payload.
	pub fn into_map(self) -> Map<String, Value> {
		self.0
	}

	/// Serializes the payload for storage or for the application.
	pub fn to_json(&self) -> String {
		Value::Object(self.0.clone()).to_string()
	}

	/// Parses a stored payload.
	pub fn from_json(raw: &str) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		let mut de = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut de)
	}

	fn str_field(&self, field: &str) -> Option<&str> {
		self.0.get(field).and_then(Value::as_str)
	}
}
impl TryFrom<Map<String, Value>> for CredentialRecord {
	type Error = CredentialError;

	fn try_from(payload: Map<String, Value>) -> Result<Self, Self::Error> {
		Self::from_payload(payload)
	}
}
impl From<CredentialRecord> for Map<String, Value> {
	fn from(value: CredentialRecord) -> Self {
		value.0
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (key, value) in &self.0 {
			if REDACTED_FIELDS.contains(&key.as_str()) {
				map.entry(key, &"<redacted>");
			} else {
				map.entry(key, value);
			}
		}

		map.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn record(value: Value) -> CredentialRecord {
		let Value::Object(map) = value else { panic!("Fixture must be a JSON object.") };

		CredentialRecord::from_payload(map).expect("Fixture should carry an access token.")
	}

	#[test]
	fn payload_without_access_token_is_rejected() {
		let Value::Object(map) = json!({ "refresh_token": "r" }) else { unreachable!() };

		assert_eq!(CredentialRecord::from_payload(map), Err(CredentialError::MissingAccessToken));
		assert!(serde_json::from_str::<CredentialRecord>("{\"access_token\":\"\"}").is_err());
	}

	#[test]
	fn unknown_fields_survive_verbatim() {
		let credentials = record(json!({
			"access_token": "tok",
			"workspace_id": "ws-1",
			"owner": { "type": "user" },
		}));
		let reparsed = CredentialRecord::from_json(&credentials.to_json())
			.expect("Serialized payload should parse.");

		assert_eq!(reparsed, credentials);
		assert_eq!(reparsed.get("workspace_id"), Some(&json!("ws-1")));
		assert_eq!(reparsed.get("owner"), Some(&json!({ "type": "user" })));
	}

	#[test]
	fn expires_in_accepts_numbers_and_strings() {
		assert_eq!(
			record(json!({ "access_token": "a", "expires_in": 1800 })).expires_in(),
			Some(Duration::seconds(1800))
		);
		assert_eq!(
			record(json!({ "access_token": "a", "expires_in": "60" })).expires_in(),
			Some(Duration::seconds(60))
		);
		assert_eq!(record(json!({ "access_token": "a" })).expires_in(), None);
	}

	#[test]
	fn ttl_is_bounded_by_ceiling() {
		let ceiling = Duration::minutes(10);

		assert_eq!(
			record(json!({ "access_token": "a", "expires_in": 3600 })).ttl(ceiling),
			ceiling
		);
		assert_eq!(
			record(json!({ "access_token": "a", "expires_in": 120 })).ttl(ceiling),
			Duration::seconds(120)
		);
		assert_eq!(record(json!({ "access_token": "a", "expires_in": 0 })).ttl(ceiling), ceiling);
		assert_eq!(record(json!({ "access_token": "a" })).ttl(ceiling), ceiling);
	}

	#[test]
	fn debug_redacts_tokens() {
		let credentials = record(json!({
			"access_token": "top-secret",
			"refresh_token": "also-secret",
			"token_type": "bearer",
		}));
		let rendered = format!("{credentials:?}");

		assert!(!rendered.contains("secret"));
		assert!(rendered.contains("bearer"));
		assert_eq!(credentials.access_token(), "top-secret");
		assert_eq!(credentials.refresh_token(), Some("also-secret"));
	}
}
