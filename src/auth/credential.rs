//! Access/refresh credential pair owned by the credential store.

// crates.io
use ::http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Immutable access/refresh pair granting authorization to protected endpoints.
///
/// A refresh never edits a credential in place; it produces a new value that replaces the old
/// one in [`CredentialStore`](crate::store::CredentialStore) in a single step.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Bearer token attached to every API request; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token exchanged at the refresh endpoint for a new pair.
	pub refresh_token: TokenSecret,
	/// Instant the pair was obtained from the identity provider.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential stamped with the current UTC instant.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self {
			access_token: access_token.into(),
			refresh_token: refresh_token.into(),
			issued_at: OffsetDateTime::now_utc(),
		}
	}

	/// Overrides the issued-at instant.
	pub fn with_issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = instant;

		self
	}

	/// Builds the sensitive `Authorization` header value for the provided scheme.
	pub fn authorization_value(&self, scheme: &str) -> Result<HeaderValue, ConfigError> {
		let mut value = HeaderValue::try_from(format!("{scheme} {}", self.access_token.expose()))
			.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access", &self.access_token.fingerprint())
			.field("refresh", &self.refresh_token.fingerprint())
			.field("issued_at", &self.issued_at)
			.finish()
	}
}
