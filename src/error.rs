//! Gateway-level error types shared across flows, providers, and stores.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The provider redirect carried an error, or omitted `code`/`state`.
	#[error("Authorization callback was rejected: {reason}.")]
	CallbackRejected {
		/// Provider-supplied description, or a gateway summary when none was sent.
		reason: String,
	},
	/// State was missing, expired, already consumed, or did not match.
	///
	/// The variant intentionally carries no detail so callers cannot distinguish the cases.
	#[error("Authorization state is invalid or expired.")]
	InvalidState,
	/// The token endpoint rejected the code or could not be reached.
	#[error(transparent)]
	TokenExchangeFailed(#[from] ExchangeError),
	/// Storage backend failure after retries were exhausted.
	#[error("{0}")]
	StoreUnavailable(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Nothing is stored for the requested identity.
	#[error("No credentials found.")]
	NoCredentials,
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` for failures caused by the end user or the provider rather than the
	/// gateway's own infrastructure.
	pub fn is_user_visible(&self) -> bool {
		matches!(
			self,
			Self::CallbackRejected { .. }
				| Self::InvalidState
				| Self::TokenExchangeFailed(_)
				| Self::NoCredentials
		)
	}

	/// HTTP status code an outer HTTP layer should answer with.
	pub fn status_code(&self) -> u16 {
		if self.is_user_visible() { 400 } else { 500 }
	}
}

/// Configuration and validation failures raised while assembling a gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required setting was not supplied.
	#[error("Missing required setting `{key}`.")]
	MissingSetting {
		/// Setting name (environment variable or field).
		key: String,
	},
	/// A setting was supplied but could not be used.
	#[error("Setting `{key}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting name (environment variable or field).
		key: String,
		/// Human-readable reason.
		reason: String,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI must use HTTPS unless it points at a loopback host.
	#[error("Redirect URI must use HTTPS: {url}.")]
	InsecureRedirect {
		/// Offending redirect URI.
		url: String,
	},
	/// Requested scope entry is empty or contains whitespace.
	#[error("Scope `{scope}` is empty or contains whitespace.")]
	InvalidScope {
		/// Offending scope entry.
		scope: String,
	},
	/// State TTL falls outside `(0, 10 minutes]`.
	#[error("State TTL must be positive and at most 10 minutes.")]
	StateTtlOutOfRange,
	/// A duration setting must be strictly positive.
	#[error("The {setting} duration must be positive.")]
	NonPositiveDuration {
		/// Setting label.
		setting: &'static str,
	},
	/// A duration setting exceeds its upper bound.
	#[error("The {setting} duration must be at most {max}.")]
	DurationTooLong {
		/// Setting label.
		setting: &'static str,
		/// Largest accepted value.
		max: Duration,
	},
	/// Retry policy must allow at least one attempt.
	#[error("Store retry policy must allow at least one attempt.")]
	NoStoreAttempts,
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while exchanging an authorization code at the token endpoint.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Token endpoint answered with a non-2xx status.
	#[error("Token endpoint rejected the exchange with HTTP {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// OAuth `error` field, when the body carried one.
		error: Option<String>,
		/// OAuth `error_description` field, when the body carried one.
		description: Option<String>,
	},
	/// Token endpoint did not answer within the exchange timeout.
	#[error("Token endpoint did not respond within {after}.")]
	Timeout {
		/// Timeout that elapsed.
		after: Duration,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error("Token request could not be built.")]
	InvalidRequest(#[from] oauth2::http::Error),
	/// Token endpoint returned a body that is not a JSON object.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint payload has no usable `access_token`.
	#[error(transparent)]
	MissingAccessToken(#[from] crate::auth::CredentialError),
}
impl ExchangeError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}

	/// HTTP status returned by the provider, when the request got that far.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_into_gateway_error_with_source() {
		let store_error =
			StoreError::Unavailable { attempts: 3, message: "connection refused".into() };
		let gateway_error: Error = store_error.clone().into();

		assert!(matches!(gateway_error, Error::StoreUnavailable(_)));
		assert!(gateway_error.to_string().contains("connection refused"));

		let source = StdError::source(&gateway_error)
			.expect("Gateway error should expose the underlying store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
		assert_eq!(gateway_error.status_code(), 500);
	}

	#[test]
	fn invalid_state_message_is_opaque() {
		assert_eq!(Error::InvalidState.to_string(), "Authorization state is invalid or expired.");
		assert_eq!(Error::InvalidState.status_code(), 400);
	}

	#[test]
	fn rejected_exchange_exposes_status() {
		let err = ExchangeError::Rejected {
			status: 400,
			error: Some("invalid_grant".into()),
			description: None,
		};

		assert_eq!(err.status(), Some(400));
		assert!(Error::from(err).is_user_visible());
	}
}
