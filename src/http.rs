//! Transport primitives for API calls made through the session.
//!
//! The module exposes [`HttpTransport`], the crate's only dependency on an HTTP stack, along
//! with the [`RequestDescriptor`] callers build, the resolved [`OutboundRequest`] a transport
//! executes, and the buffered [`ApiResponse`] it returns. Non-2xx statuses are responses, not
//! errors; only failures to exchange bytes surface as [`TransportError`].

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use ::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::{ConfigError, DecodeError, TransportError},
	provider::ApiDescriptor,
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing fully resolved requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared between the
/// dispatcher and the identity provider behind an `Arc`. They must not follow redirects to
/// another origin with the `Authorization` header attached and must not retry on their own;
/// replay policy belongs to the dispatcher.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// A request resolved against an [`ApiDescriptor`], ready for the wire.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Final header set, including `Authorization` when a credential was attached.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl OutboundRequest {
	/// Returns the bearer token carried by the request, if any.
	pub fn bearer(&self) -> Option<&str> {
		self.headers
			.get(AUTHORIZATION)?
			.to_str()
			.ok()?
			.split_once(' ')
			.map(|(_, token)| token)
	}
}

/// Caller-owned description of an API request.
///
/// The descriptor is replayed verbatim after a credential refresh; only the `Authorization`
/// header changes between attempts. The replay flag can be raised once and never cleared.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the API base URL.
	pub path: String,
	/// Caller-supplied headers; these override the JSON defaults.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	retried: bool,
}
impl RequestDescriptor {
	/// Creates a descriptor with no headers or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: HeaderMap::new(), body: None, retried: false }
	}

	/// `GET` shorthand.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST` shorthand.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `PUT` shorthand.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// `PATCH` shorthand.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// `DELETE` shorthand.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
		let invalid = || ConfigError::InvalidHeader { name: name.into() };
		let name = HeaderName::try_from(name).map_err(|_| invalid())?;
		let value = HeaderValue::try_from(value).map_err(|_| invalid())?;

		self.headers.insert(name, value);

		Ok(self)
	}

	/// Serializes `body` as the JSON request body.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.set_json(body)?;

		Ok(self)
	}

	/// Replaces the body in place, keeping the replay flag.
	pub(crate) fn set_json<T>(&mut self, body: &T) -> Result<(), ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(ConfigError::EncodeBody)?);

		Ok(())
	}

	/// Returns `true` once the request has been replayed after a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Raises the replay flag; returns `false` if it was already raised.
	pub(crate) fn mark_retried(&mut self) -> bool {
		!std::mem::replace(&mut self.retried, true)
	}

	/// Resolves the descriptor against `descriptor`, attaching `credential` when present.
	pub fn to_outbound(
		&self,
		descriptor: &ApiDescriptor,
		credential: Option<&Credential>,
	) -> Result<OutboundRequest, ConfigError> {
		let url = descriptor.endpoint(&self.path)?;
		let mut headers = HeaderMap::with_capacity(self.headers.len() + 3);

		headers.insert(ACCEPT, application_json());

		if self.body.is_some() {
			headers.insert(CONTENT_TYPE, application_json());
		}

		for (name, value) in &self.headers {
			headers.insert(name.clone(), value.clone());
		}

		if let Some(credential) = credential {
			let value = credential.authorization_value(&descriptor.convention.scheme)?;

			headers.insert(AUTHORIZATION, value);
		}

		Ok(OutboundRequest { method: self.method.clone(), url, headers, body: self.body.clone() })
	}
}

fn application_json() -> HeaderValue {
	HeaderValue::from_static("application/json")
}

/// Buffered HTTP response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Full response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with no headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T, DecodeError>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| DecodeError { status: self.status.as_u16(), source })
	}

	/// Returns the body as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// reqwest strips `Authorization` when a redirect crosses hosts; callers that supply a custom
/// client should keep that behavior.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder =
				client.request(request.method, request.url).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}
