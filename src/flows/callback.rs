//! Provider redirect handling: state validation, code exchange, and credential storage.

// std
use std::borrow::Cow;
// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, Secret, StateClaims},
	flows::Gateway,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, StateRejection},
};

/// `Content-Type` of the page produced by [`Gateway::complete_callback`].
pub const CALLBACK_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const SUCCESS_MESSAGE: &str = "Authorization complete. You can close this window.";
const INTERNAL_FAILURE_MESSAGE: &str = "Authorization could not be completed. Please try again.";

/// Query parameters delivered to the registered redirect URI.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
	/// Authorization code issued by the provider.
	pub code: Option<String>,
	/// Opaque state echoed back by the provider.
	pub state: Option<String>,
	/// OAuth error code sent instead of a code.
	pub error: Option<String>,
	/// Human-readable error detail sent alongside [`CallbackParams::error`].
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Parses a raw query string, with or without the leading `?`.
	pub fn from_query(query: &str) -> Self {
		let query = query.strip_prefix('?').unwrap_or(query);

		Self::from_pairs(form_urlencoded::parse(query.as_bytes()))
	}

	/// Extracts the parameters from a full redirect URL.
	pub fn from_url(url: &Url) -> Self {
		Self::from_pairs(url.query_pairs())
	}

	fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
		let mut params = Self::default();

		for (name, value) in pairs {
			let slot = match name.as_ref() {
				"code" => &mut params.code,
				"state" => &mut params.state,
				"error" => &mut params.error,
				"error_description" => &mut params.error_description,
				_ => continue,
			};

			// First occurrence wins.
			if slot.is_none() {
				*slot = Some(value.into_owned());
			}
		}

		params
	}

	fn present(value: &Option<String>) -> Option<&str> {
		value.as_deref().map(str::trim).filter(|v| !v.is_empty())
	}
}
impl Debug for CallbackParams {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackParams")
			.field("code", &self.code.as_ref().map(|_| "<redacted>"))
			.field("state", &self.state)
			.field("error", &self.error)
			.field("error_description", &self.error_description)
			.finish()
	}
}

/// Progress markers emitted while a callback is processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackStage {
	/// Parameters received, nothing checked yet.
	AwaitingCode,
	/// State matched and was consumed.
	StateValidated,
	/// Token endpoint returned credentials.
	TokenExchanged,
	/// Credentials written to the store.
	Stored,
}
impl CallbackStage {
	/// Returns a stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AwaitingCode => "awaiting_code",
			Self::StateValidated => "state_validated",
			Self::TokenExchanged => "token_exchanged",
			Self::Stored => "stored",
		}
	}
}

/// Minimal HTTP answer for the browser that followed the provider redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackResponse {
	/// HTTP status code.
	pub status: u16,
	/// HTML page that closes its own window; see [`CALLBACK_CONTENT_TYPE`].
	pub body: String,
}

impl<C> Gateway<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Processes a provider redirect and stores the exchanged credentials.
	///
	/// The state is consumed before the code is exchanged, so a replayed callback fails with
	/// [`Error::InvalidState`] even when the first attempt's exchange failed. Nothing is
	/// written unless the exchange succeeds.
	pub async fn handle_callback(&self, params: CallbackParams) -> Result<CredentialRecord> {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "handle_callback", &self.descriptor.id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.process_callback(params)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Runs [`Gateway::handle_callback`] and renders the browser-facing response.
	///
	/// Infrastructure failures are reported with a generic message so store or
	/// configuration details never reach the end user.
	pub async fn complete_callback(&self, params: CallbackParams) -> CallbackResponse {
		match self.handle_callback(params).await {
			Ok(_) => CallbackResponse { status: 200, body: close_window_page(SUCCESS_MESSAGE) },
			Err(e) => {
				let message = if e.is_user_visible() {
					e.to_string()
				} else {
					INTERNAL_FAILURE_MESSAGE.to_owned()
				};

				CallbackResponse { status: e.status_code(), body: close_window_page(&message) }
			},
		}
	}

	async fn process_callback(&self, params: CallbackParams) -> Result<CredentialRecord> {
		obs::record_stage(CallbackStage::AwaitingCode.as_str());

		if let Some(error) = CallbackParams::present(&params.error) {
			let reason = CallbackParams::present(&params.error_description).unwrap_or(error);

			return Err(Error::CallbackRejected { reason: reason.to_owned() });
		}

		let (Some(code), Some(state)) =
			(CallbackParams::present(&params.code), CallbackParams::present(&params.state))
		else {
			return Err(Error::CallbackRejected { reason: "missing code/state".into() });
		};
		let Ok(claims) = StateClaims::decode(state) else {
			return Err(self.reject_state(StateRejection::Undecodable, None));
		};
		let record = self.consume_state(&claims.org_id, &claims.user_id, state).await?;

		obs::record_stage(CallbackStage::StateValidated.as_str());

		let credentials = self
			.facade
			.exchange_authorization_code(code, record.code_verifier.as_ref().map(Secret::expose))
			.await
			.inspect_err(|e| obs::record_exchange_failure(&self.descriptor.id, e))?;

		obs::record_stage(CallbackStage::TokenExchanged.as_str());

		let key = self.credentials_key(&claims.org_id, &claims.user_id);
		let ttl = credentials.ttl(self.config.credential_ttl_ceiling);

		self.store.set(&key, credentials.to_json(), Some(ttl)).await?;

		obs::record_stage(CallbackStage::Stored.as_str());

		Ok(credentials)
	}
}

fn close_window_page(message: &str) -> String {
	let message = escape_html(message);

	format!(
		"<!DOCTYPE html>\n<html>\n\
		 <head><meta charset=\"utf-8\"><title>Authorization</title></head>\n\
		 <body>\n<p>{message}</p>\n<script>window.close();</script>\n</body>\n\
		 </html>\n"
	)
}

fn escape_html(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for c in raw.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			c => escaped.push(c),
		}
	}

	escaped
}
