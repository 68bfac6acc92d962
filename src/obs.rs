//! Optional observability helpers for gateway flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `integration_gateway.flow` with
//!   the `flow`, `stage`, and `provider` fields, plus `warn`/`debug` events for state
//!   rejections, store retries, exchange failures, and handoffs. Nonces and tokens are never
//!   logged; state events carry a short SHA-256 fingerprint instead.
//! - Enable `metrics` to increment `integration_gateway_flow_total` (labeled by `flow` +
//!   `outcome`) and `integration_gateway_state_rejected_total` (labeled by `reason`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, auth::ProviderId, error::ExchangeError};

/// Gateway operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Minting state and building the consent URL.
	Authorize,
	/// Validating state and exchanging the code.
	Callback,
	/// Handing stored credentials to the application.
	Handoff,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorize => "authorize",
			FlowKind::Callback => "callback",
			FlowKind::Handoff => "handoff",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why a callback's state was refused. Only logs and metrics see this; callers always get
/// [`Error::InvalidState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateRejection {
	/// No pending state for the identity (never issued, expired, or already used).
	Missing,
	/// A pending state exists but its nonce differs.
	Mismatch,
	/// The received state was issued for a different identity.
	IdentityMismatch,
	/// The received state could not be decoded.
	Undecodable,
	/// The stored state could not be parsed.
	Corrupt,
	/// A concurrent callback consumed the state first.
	Consumed,
}
impl StateRejection {
	/// Returns a stable label suitable for log or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StateRejection::Missing => "missing",
			StateRejection::Mismatch => "mismatch",
			StateRejection::IdentityMismatch => "identity_mismatch",
			StateRejection::Undecodable => "undecodable",
			StateRejection::Corrupt => "corrupt",
			StateRejection::Consumed => "consumed",
		}
	}
}
impl Display for StateRejection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

pub(crate) fn record_state_rejected(
	provider: &ProviderId,
	reason: StateRejection,
	fingerprint: Option<&str>,
) {
	metrics::record_state_rejection(reason);

	#[cfg(feature = "tracing")]
	::tracing::warn!(
		provider = %provider,
		reason = reason.as_str(),
		nonce_fingerprint = fingerprint.unwrap_or("-"),
		"authorization state rejected"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (provider, fingerprint);
}

pub(crate) fn record_store_retry(operation: &'static str, attempt: u32, message: &str) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(operation, attempt, error = message, "store call failed; retrying");
	#[cfg(not(feature = "tracing"))]
	let _ = (operation, attempt, message);
}

pub(crate) fn record_exchange_failure(provider: &ProviderId, error: &ExchangeError) {
	#[cfg(feature = "tracing")]
	{
		match error {
			ExchangeError::Rejected { status, error, description } => ::tracing::warn!(
				provider = %provider,
				status,
				oauth_error = error.as_deref().unwrap_or("-"),
				description = description.as_deref().unwrap_or("-"),
				"token endpoint rejected the exchange"
			),
			other => {
				::tracing::warn!(provider = %provider, error = %other, "token exchange failed")
			},
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (provider, error);
}

pub(crate) fn record_stage(stage: &'static str) {
	#[cfg(feature = "tracing")]
	::tracing::debug!(stage, "callback stage reached");
	#[cfg(not(feature = "tracing"))]
	let _ = stage;
}

pub(crate) fn record_handoff(provider: &ProviderId, found: bool, consumed: bool, atomic: bool) {
	#[cfg(feature = "tracing")]
	{
		::tracing::debug!(provider = %provider, found, consumed, "credentials handed off");

		if consumed && !atomic {
			::tracing::debug!(
				provider = %provider,
				"store take is not atomic; concurrent fetches may both observe the credentials"
			);
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (provider, found, consumed, atomic);
}
