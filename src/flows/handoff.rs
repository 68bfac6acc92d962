//! Credential handoff to the application.

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, OrgId, UserId},
	flows::Gateway,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::StoreError,
};

/// Whether fetching credentials removes them from the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPolicy {
	/// The first fetch takes the credentials; later fetches find nothing.
	#[default]
	SingleUse,
	/// Credentials stay readable until their TTL lapses.
	ExpiryOnly,
}
impl HandoffPolicy {
	/// Returns the configuration spelling of the policy.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::SingleUse => "single_use",
			Self::ExpiryOnly => "expiry_only",
		}
	}
}
impl Display for HandoffPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for HandoffPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
			"single_use" => Ok(Self::SingleUse),
			"expiry_only" => Ok(Self::ExpiryOnly),
			other => Err(format!("expected `single_use` or `expiry_only`, got `{other}`")),
		}
	}
}

impl<C> Gateway<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Returns the credentials stored for the identity, if any.
	///
	/// Under [`HandoffPolicy::SingleUse`] the read also deletes them. Whether two concurrent
	/// fetches can both succeed depends on [`crate::store::KvStore::atomic_take`].
	pub async fn fetch_credentials(
		&self,
		user_id: &UserId,
		org_id: &OrgId,
	) -> Result<Option<CredentialRecord>> {
		const KIND: FlowKind = FlowKind::Handoff;

		let span = FlowSpan::new(KIND, "fetch_credentials", &self.descriptor.id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let key = self.credentials_key(org_id, user_id);
				let consume = self.config.handoff == HandoffPolicy::SingleUse;
				let raw = if consume {
					self.store.take(&key).await?
				} else {
					self.store.get(&key).await?
				};

				obs::record_handoff(
					&self.descriptor.id,
					raw.is_some(),
					consume && raw.is_some(),
					self.store.atomic_take(),
				);

				let Some(raw) = raw else { return Ok(None) };
				let record = CredentialRecord::from_json(&raw).map_err(StoreError::serialization)?;

				Ok(Some(record))
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Like [`Gateway::fetch_credentials`] but treats absence as [`Error::NoCredentials`].
	pub async fn require_credentials(
		&self,
		user_id: &UserId,
		org_id: &OrgId,
	) -> Result<CredentialRecord> {
		self.fetch_credentials(user_id, org_id).await?.ok_or(Error::NoCredentials)
	}
}
