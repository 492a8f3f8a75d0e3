// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	provider::{ApiDescriptor, ApiEndpoints, AuthConvention},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DescriptorError {
	/// Base URL cannot have paths joined onto it (e.g., `mailto:`).
	#[error("Base URL `{url}` cannot be used as a base.")]
	CannotBeABase {
		/// Offending base URL.
		url: String,
	},
	/// Non-loopback endpoints must use HTTPS.
	#[error("The API base URL must use HTTPS outside loopback hosts: {url}.")]
	InsecureEndpoint {
		/// Base URL that failed validation.
		url: String,
	},
	/// Identity-provider routes must stay relative to the base URL.
	#[error("The {endpoint} route must be a relative path: {path}.")]
	AbsoluteRoute {
		/// Which route failed validation.
		endpoint: &'static str,
		/// Route value that failed validation.
		path: String,
	},
	/// Identity-provider routes cannot be empty.
	#[error("The {endpoint} route is empty.")]
	EmptyRoute {
		/// Which route failed validation.
		endpoint: &'static str,
	},
	/// The unauthorized status must be a client-error code.
	#[error("Unauthorized status {status} is not a 4xx code.")]
	InvalidUnauthorizedStatus {
		/// Status that failed validation.
		status: u16,
	},
	/// The authorization scheme must be a single non-empty token.
	#[error("Authorization scheme `{scheme}` is not a valid token.")]
	InvalidScheme {
		/// Scheme that failed validation.
		scheme: String,
	},
}

/// Builder for [`ApiDescriptor`] values.
///
/// Deserialized descriptors pass through this builder, so configuration files get the same
/// validation as code.
#[derive(Debug, Deserialize)]
pub struct ApiDescriptorBuilder {
	/// Base URL for every request path.
	pub base_url: Url,
	/// Identity-provider routes.
	#[serde(default)]
	pub endpoints: ApiEndpoints,
	/// Authorization convention.
	#[serde(default)]
	pub convention: AuthConvention,
}
impl ApiDescriptorBuilder {
	/// Creates a new builder seeded with the provided base URL and default routes.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, endpoints: ApiEndpoints::default(), convention: AuthConvention::default() }
	}

	/// Overrides the sign-in route.
	pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.sign_in = path.into();

		self
	}

	/// Overrides the refresh route.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the logout route.
	pub fn logout_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.logout = path.into();

		self
	}

	/// Overrides the authorization scheme (defaults to `Bearer`).
	pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
		self.convention.scheme = scheme.into();

		self
	}

	/// Overrides the authentication-failure status (defaults to 401).
	pub fn unauthorized_status(mut self, status: u16) -> Self {
		self.convention.unauthorized_status = status;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiDescriptor, DescriptorError> {
		let mut base_url = self.base_url;

		if base_url.cannot_be_a_base() {
			return Err(DescriptorError::CannotBeABase { url: base_url.to_string() });
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let descriptor =
			ApiDescriptor { base_url, endpoints: self.endpoints, convention: self.convention };

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl TryFrom<ApiDescriptorBuilder> for ApiDescriptor {
	type Error = DescriptorError;

	fn try_from(builder: ApiDescriptorBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}

impl ApiDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), DescriptorError> {
		validate_base(&self.base_url)?;
		validate_route("sign_in", &self.endpoints.sign_in)?;
		validate_route("refresh", &self.endpoints.refresh)?;
		validate_route("logout", &self.endpoints.logout)?;

		let status = self.convention.unauthorized_status;

		if !(400..500).contains(&status) {
			return Err(DescriptorError::InvalidUnauthorizedStatus { status });
		}

		let scheme = &self.convention.scheme;

		if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_graphic()) {
			return Err(DescriptorError::InvalidScheme { scheme: scheme.clone() });
		}

		Ok(())
	}
}

fn validate_base(url: &Url) -> Result<(), DescriptorError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(DescriptorError::InsecureEndpoint { url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

fn validate_route(endpoint: &'static str, path: &str) -> Result<(), DescriptorError> {
	if path.trim_start_matches('/').is_empty() {
		return Err(DescriptorError::EmptyRoute { endpoint });
	}
	if Url::parse(path).is_ok() {
		return Err(DescriptorError::AbsoluteRoute { endpoint, path: path.into() });
	}

	Ok(())
}
