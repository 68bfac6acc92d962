//! Authorization start and anti-CSRF state validation.
//!
//! [`Gateway::begin_authorization`] mints a fresh [`StateRecord`], stores it under the
//! identity's state key (replacing any pending one), and returns the consent URL.
//! [`Gateway::validate_state`] checks a returned `state` against the stored record and
//! consumes it with a compare-and-delete, so a state is accepted at most once and a
//! mismatching attempt cannot burn the legitimate pending flow.

// self
use crate::{
	_prelude::*,
	auth::{EncodedState, OrgId, PKCE_CHALLENGE_METHOD, StateClaims, StateRecord, UserId},
	flows::Gateway,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, StateRejection},
	store::StoreError,
};

/// Consent URL plus the opaque state it carries.
#[derive(Clone, Debug)]
pub struct AuthorizationStart {
	/// Provider consent URL the end user should be sent to.
	pub authorize_url: Url,
	/// Encoded `state` parameter embedded in [`AuthorizationStart::authorize_url`].
	pub state: EncodedState,
	/// How long the pending state stays valid.
	pub expires_in: Duration,
}

impl<C> Gateway<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Mints and stores a fresh state for the identity and returns the consent URL.
	///
	/// A later call for the same identity replaces the pending state, so only the most
	/// recent consent URL can complete.
	pub async fn begin_authorization(
		&self,
		user_id: &UserId,
		org_id: &OrgId,
	) -> Result<AuthorizationStart> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "begin_authorization", &self.descriptor.id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let record = StateRecord::issue(
					user_id.clone(),
					org_id.clone(),
					self.descriptor.requires_pkce(),
				);
				let state = record.claims.encode().map_err(StoreError::serialization)?;
				let stored = record.to_json().map_err(StoreError::serialization)?;

				self.store
					.set(&self.state_key(org_id, user_id), stored, Some(self.config.state_ttl))
					.await?;

				let authorize_url = self.authorize_url(&state, record.code_challenge().as_deref());

				Ok(AuthorizationStart { authorize_url, state, expires_in: self.config.state_ttl })
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Validates and consumes a returned `state` for the identity.
	///
	/// Every failure (undecodable, wrong identity, missing, expired, mismatched, or already
	/// consumed) surfaces as [`Error::InvalidState`]; the precise reason is only logged.
	pub async fn validate_state(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
		received_state: &str,
	) -> Result<StateRecord> {
		let span = FlowSpan::new(FlowKind::Callback, "validate_state", &self.descriptor.id);

		span.instrument(self.consume_state(org_id, user_id, received_state)).await
	}

	pub(crate) async fn consume_state(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
		received_state: &str,
	) -> Result<StateRecord> {
		let Ok(claims) = StateClaims::decode(received_state) else {
			return Err(self.reject_state(StateRejection::Undecodable, None));
		};
		let fingerprint = claims.nonce.fingerprint();
		let fingerprint = Some(fingerprint.as_str());

		if !claims.is_for(org_id, user_id) {
			return Err(self.reject_state(StateRejection::IdentityMismatch, fingerprint));
		}

		let key = self.state_key(org_id, user_id);
		let Some(raw) = self.store.get(&key).await? else {
			return Err(self.reject_state(StateRejection::Missing, fingerprint));
		};
		let Ok(stored) = StateRecord::from_json(&raw) else {
			return Err(self.reject_state(StateRejection::Corrupt, fingerprint));
		};

		if !stored.claims.is_for(org_id, user_id) || !stored.claims.nonce.matches(&claims.nonce) {
			return Err(self.reject_state(StateRejection::Mismatch, fingerprint));
		}
		if !self.store.delete_if(&key, &raw).await? {
			return Err(self.reject_state(StateRejection::Consumed, fingerprint));
		}

		Ok(stored)
	}

	pub(crate) fn reject_state(&self, reason: StateRejection, fingerprint: Option<&str>) -> Error {
		obs::record_state_rejected(&self.descriptor.id, reason, fingerprint);

		Error::InvalidState
	}

	fn authorize_url(&self, state: &EncodedState, code_challenge: Option<&str>) -> Url {
		let mut url = self.descriptor.endpoints.authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("client_id", &self.config.client_id);
		pairs.append_pair("redirect_uri", self.config.redirect_uri.as_str());

		if let Some(scope) = self.descriptor.scope_param(&self.config.scopes) {
			pairs.append_pair("scope", &scope);
		}

		pairs.append_pair("response_type", "code");
		pairs.append_pair("state", state.as_str());

		if let Some(challenge) = code_challenge {
			pairs.append_pair("code_challenge", challenge);
			pairs.append_pair("code_challenge_method", PKCE_CHALLENGE_METHOD);
		}
		for (name, value) in &self.descriptor.quirks.authorize_params {
			pairs.append_pair(name, value);
		}

		drop(pairs);

		url
	}
}
