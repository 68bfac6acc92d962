//! Anti-CSRF authorization state.
//!
//! Two shapes of the same state exist. [`StateClaims`] (nonce + identity) is encoded into the
//! opaque `state` query parameter and round-tripped by the provider. [`StateRecord`] is the
//! server-side copy stored under the identity's state key; it additionally carries the PKCE
//! verifier for providers that require one, which never leaves the gateway.

// crates.io
use base64::{
	Engine as _, alphabet,
	engine::{
		DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::URL_SAFE_NO_PAD,
	},
};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{OrgId, Secret, UserId},
};

const NONCE_BYTES: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;
const FINGERPRINT_BYTES: usize = 8;

// Providers and older clients may hand back padded base64; accept both.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new()
		.with_encode_padding(false)
		.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// PKCE challenge method used for every provider that requires PKCE.
pub const PKCE_CHALLENGE_METHOD: &str = "S256";

/// Errors raised while decoding a received `state` parameter.
#[derive(Debug, ThisError)]
pub enum StateDecodeError {
	/// The parameter is not URL-safe base64.
	#[error("State is not valid URL-safe base64.")]
	Base64(#[from] base64::DecodeError),
	/// The decoded bytes are not the expected JSON document.
	#[error("State payload is malformed.")]
	Json(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// High-entropy, single-use anti-CSRF nonce.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateNonce(String);
impl StateNonce {
	/// Generates a fresh nonce from 256 random bits.
	pub fn generate() -> Self {
		let mut bytes = [0_u8; NONCE_BYTES];

		rand::rng().fill(&mut bytes);

		Self(URL_SAFE_NO_PAD.encode(bytes))
	}

	/// Wraps an existing nonce value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the nonce string.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Compares two nonces without short-circuiting on the first differing byte.
	pub fn matches(&self, other: &StateNonce) -> bool {
		let (a, b) = (self.0.as_bytes(), other.0.as_bytes());

		if a.len() != b.len() {
			return false;
		}

		a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
	}

	/// Short SHA-256 fingerprint that is safe to log in place of the nonce.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());

		URL_SAFE_NO_PAD.encode(&digest[..FINGERPRINT_BYTES])
	}
}
impl Debug for StateNonce {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("StateNonce").field(&self.fingerprint()).finish()
	}
}

/// Opaque `state` parameter as sent to (and returned by) the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedState(String);
impl EncodedState {
	/// Returns the encoded string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for EncodedState {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Display for EncodedState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl From<EncodedState> for String {
	fn from(value: EncodedState) -> Self {
		value.0
	}
}

/// Identity-bound claims carried inside the round-tripped `state` parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateClaims {
	/// Anti-CSRF nonce.
	#[serde(rename = "state")]
	pub nonce: StateNonce,
	/// User who started the authorization.
	pub user_id: UserId,
	/// Organization the user belongs to.
	pub org_id: OrgId,
}
impl StateClaims {
	/// Encodes the claims as URL-safe base64 (no padding) JSON.
	pub fn encode(&self) -> Result<EncodedState, serde_json::Error> {
		let json = serde_json::to_vec(self)?;

		Ok(EncodedState(URL_SAFE_NO_PAD.encode(json)))
	}

	/// Decodes a received `state` parameter (padded or unpadded).
	pub fn decode(raw: &str) -> Result<Self, StateDecodeError> {
		let bytes = URL_SAFE_LENIENT.decode(raw.trim())?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);

		Ok(serde_path_to_error::deserialize(&mut de)?)
	}

	/// Returns `true` when the claims were issued for the provided identity.
	pub fn is_for(&self, org_id: &OrgId, user_id: &UserId) -> bool {
		&self.org_id == org_id && &self.user_id == user_id
	}
}

/// Server-side state stored for the lifetime of one authorization attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
	/// Claims shared with the provider.
	#[serde(flatten)]
	pub claims: StateClaims,
	/// PKCE verifier, present only for providers that require PKCE.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code_verifier: Option<Secret>,
}
impl StateRecord {
	/// Issues a fresh record for the identity, generating a PKCE verifier when requested.
	pub fn issue(user_id: UserId, org_id: OrgId, with_pkce: bool) -> Self {
		let claims = StateClaims { nonce: StateNonce::generate(), user_id, org_id };
		let code_verifier = with_pkce.then(|| Secret::new(random_verifier()));

		Self { claims, code_verifier }
	}

	/// S256 challenge derived from the verifier, when PKCE is in use.
	pub fn code_challenge(&self) -> Option<String> {
		self.code_verifier.as_ref().map(|verifier| pkce_challenge(verifier.expose()))
	}

	/// Serializes the record for storage.
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	/// Parses a stored record.
	pub fn from_json(raw: &str) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		let mut de = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut de)
	}
}

/// Computes the RFC 7636 S256 challenge for a verifier.
pub fn pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_verifier() -> String {
	rand::rng().sample_iter(Alphanumeric).take(PKCE_VERIFIER_LEN).map(char::from).collect()
}
