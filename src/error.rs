//! Session-level error types shared across the store, transport, coordinator, and flows.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS); never retried by this crate.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// A refresh cycle was rejected and the caller talked to the coordinator directly.
	#[error(transparent)]
	RefreshRejected(#[from] RefreshRejected),

	/// Identity provider refused the sign-in credentials.
	#[error("Sign-in was rejected with status {status}: {reason}.")]
	InvalidCredentials {
		/// HTTP status returned by the sign-in endpoint.
		status: u16,
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Identity provider refused to revoke the refresh token; the local session is gone anyway.
	#[error("Logout was rejected with status {status}: {reason}.")]
	LogoutRejected {
		/// HTTP status returned by the logout endpoint.
		status: u16,
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The session can no longer be renewed; the user must authenticate again.
	#[error("Session expired; sign in again.")]
	SessionExpired(#[source] RefreshRejected),
}
impl Error {
	/// Returns `true` when the error means the caller must re-authenticate.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired(_) | Self::RefreshRejected(_))
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// API descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::DescriptorError),
	/// Request path cannot be joined onto the base URL.
	#[error("Request path `{path}` is not a valid URL reference.")]
	InvalidPath {
		/// Offending request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path resolves outside the configured API origin.
	#[error("Request path `{path}` resolves outside the API origin.")]
	ForeignEndpoint {
		/// Offending request path.
		path: String,
	},
	/// Header name or value is not valid HTTP.
	#[error("Header `{name}` is not valid HTTP.")]
	InvalidHeader {
		/// Header name as supplied.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	EncodeBody(#[source] serde_json::Error),
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Response body did not match the expected JSON shape.
#[derive(Debug, ThisError)]
#[error("Response with status {status} carried malformed JSON.")]
pub struct DecodeError {
	/// HTTP status of the response being decoded.
	pub status: u16,
	/// Structured parsing failure, including the JSON path.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
}

/// Why a refresh cycle failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
	/// Identity provider answered with a non-success status.
	Provider,
	/// Refresh endpoint could not be reached.
	Transport,
	/// Refresh endpoint answered success with an unusable body.
	MalformedResponse,
	/// The store held no refresh token when the cycle started.
	MissingRefreshToken,
	/// The session was cleared by another actor while the refresh was in flight.
	SessionReplaced,
}
impl RejectionKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Provider => "provider",
			Self::Transport => "transport",
			Self::MalformedResponse => "malformed_response",
			Self::MissingRefreshToken => "missing_refresh_token",
			Self::SessionReplaced => "session_replaced",
		}
	}
}

/// Terminal failure of one refresh cycle, delivered identically to every waiter.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Refresh was rejected ({}): {reason}.", .kind.as_str())]
pub struct RefreshRejected {
	/// Failure classification.
	pub kind: RejectionKind,
	/// HTTP status from the refresh endpoint, when one was received.
	pub status: Option<u16>,
	/// Provider- or crate-supplied reason string.
	pub reason: String,
}
impl RefreshRejected {
	/// Provider refused to issue a new credential.
	pub fn provider(status: u16, reason: impl Into<String>) -> Self {
		Self { kind: RejectionKind::Provider, status: Some(status), reason: reason.into() }
	}

	/// Refresh endpoint was unreachable.
	pub fn transport(err: &dyn StdError) -> Self {
		Self { kind: RejectionKind::Transport, status: None, reason: err.to_string() }
	}

	/// Refresh endpoint returned a body that could not be used.
	pub fn malformed(status: u16, reason: impl Into<String>) -> Self {
		Self { kind: RejectionKind::MalformedResponse, status: Some(status), reason: reason.into() }
	}

	/// No refresh token was available.
	pub fn missing_refresh_token() -> Self {
		Self {
			kind: RejectionKind::MissingRefreshToken,
			status: None,
			reason: "No refresh token is stored".into(),
		}
	}

	/// Session was cleared while the refresh was in flight.
	pub fn session_replaced() -> Self {
		Self {
			kind: RejectionKind::SessionReplaced,
			status: None,
			reason: "The session was cleared during the refresh".into(),
		}
	}
}
