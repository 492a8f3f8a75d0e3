//! API descriptor data structures shared by the dispatcher and the identity provider.
//!
//! The module exposes validated metadata, supporting builder utilities, and the
//! authorization convention so every outbound request resolves against one origin.

/// Builder API for assembling API descriptors.
pub mod builder;
/// Bearer authorization convention.
pub mod convention;

pub use builder::*;
pub use convention::*;

// crates.io
use ::http::StatusCode;
// self
use crate::{_prelude::*, error::ConfigError};

/// Identity-provider routes, relative to [`ApiDescriptor::base_url`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
	/// Exchanges email/password for a credential pair.
	pub sign_in: String,
	/// Exchanges a refresh token for a new credential pair.
	pub refresh: String,
	/// Revokes a refresh token on sign-out.
	pub logout: String,
}
impl Default for ApiEndpoints {
	fn default() -> Self {
		Self {
			sign_in: "token/".into(),
			refresh: "token/refresh/".into(),
			logout: "accounts/logout/".into(),
		}
	}
}

/// Immutable API descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ApiDescriptorBuilder")]
pub struct ApiDescriptor {
	/// Base URL every request path is resolved against; always ends with `/`.
	pub base_url: Url,
	/// Identity-provider routes.
	pub endpoints: ApiEndpoints,
	/// How credentials are attached and how rejection is signaled.
	pub convention: AuthConvention,
}
impl ApiDescriptor {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ApiDescriptorBuilder {
		ApiDescriptorBuilder::new(base_url)
	}

	/// Resolves a request path against the base URL.
	///
	/// Leading slashes are ignored so `"/teams/"` and `"teams/"` resolve identically. Paths that
	/// escape the API origin are refused so the bearer credential never leaves it.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let url = self
			.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: path.into(), source })?;

		if url.origin() != self.base_url.origin() {
			return Err(ConfigError::ForeignEndpoint { path: path.into() });
		}

		Ok(url)
	}

	/// Returns `true` if `status` is the convention's authentication-failure status.
	pub fn is_unauthorized(&self, status: StatusCode) -> bool {
		status.as_u16() == self.convention.unauthorized_status
	}
}
