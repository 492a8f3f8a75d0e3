//! Identity provider client: password sign-in and refresh-token exchange.

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	error::RefreshRejected,
	flows::{RefreshExecutor, RefreshFuture},
	http::{ApiResponse, HttpTransport, RequestDescriptor},
	provider::ApiDescriptor,
};

const REASON_LIMIT: usize = 256;

#[derive(Serialize)]
struct SignInRequest<'a> {
	email: &'a str,
	password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
	refresh: &'a str,
}

#[derive(Deserialize)]
struct SignInResponse {
	access: String,
	refresh: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
	access: String,
	#[serde(default)]
	refresh: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
	detail: Option<String>,
}

/// Client for the identity provider's sign-in and refresh routes.
///
/// Calls made here never carry an `Authorization` header and never pass through the refresh
/// coordinator.
pub struct IdentityProvider<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	descriptor: ApiDescriptor,
}
impl<T> IdentityProvider<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over `transport` for the routes in `descriptor`.
	pub fn new(transport: Arc<T>, descriptor: ApiDescriptor) -> Self {
		Self { transport, descriptor }
	}

	/// Exchanges email and password for a credential.
	///
	/// Non-success statuses surface as [`Error::InvalidCredentials`] carrying the provider's
	/// `detail` message.
	pub async fn sign_in(&self, email: &str, password: &str) -> Result<Credential> {
		let request = RequestDescriptor::post(self.descriptor.endpoints.sign_in.as_str())
			.json(&SignInRequest { email, password })?;
		let outbound = request.to_outbound(&self.descriptor, None)?;
		let response = self.transport.execute(outbound).await?;

		if !response.is_success() {
			return Err(Error::InvalidCredentials {
				status: response.status.as_u16(),
				reason: failure_reason(&response),
			});
		}

		let pair = response.json::<SignInResponse>()?;

		Ok(Credential::new(pair.access, pair.refresh))
	}

	/// Exchanges `refresh_token` for a new credential.
	///
	/// A response that omits `refresh` keeps the presented refresh token.
	pub async fn exchange_refresh(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<Credential, RefreshRejected> {
		let outbound = RequestDescriptor::post(self.descriptor.endpoints.refresh.as_str())
			.json(&RefreshRequest { refresh: refresh_token.expose() })
			.and_then(|request| request.to_outbound(&self.descriptor, None))
			.map_err(|e| RefreshRejected::transport(&e))?;
		let response =
			self.transport.execute(outbound).await.map_err(|e| RefreshRejected::transport(&e))?;
		let status = response.status.as_u16();

		if !response.is_success() {
			return Err(RefreshRejected::provider(status, failure_reason(&response)));
		}

		let pair = response
			.json::<RefreshResponse>()
			.map_err(|e| RefreshRejected::malformed(status, e.source.to_string()))?;

		if pair.access.is_empty() {
			return Err(RefreshRejected::malformed(
				status,
				"Refresh response carried no access token",
			));
		}

		let refresh = match pair.refresh {
			Some(refresh) if !refresh.is_empty() => TokenSecret::new(refresh),
			_ => refresh_token.clone(),
		};

		Ok(Credential::new(pair.access, refresh))
	}
}
impl<T> RefreshExecutor for IdentityProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(self.exchange_refresh(refresh_token))
	}
}
impl<T> Debug for IdentityProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityProvider").field("endpoints", &self.descriptor.endpoints).finish()
	}
}

/// Extracts a human-readable failure reason from an error response.
pub(crate) fn failure_reason(response: &ApiResponse) -> String {
	if let Ok(ErrorResponse { detail: Some(detail) }) = response.json::<ErrorResponse>() {
		return detail;
	}

	let text = response.text();
	let text = text.trim();

	if text.is_empty() {
		return response.status.canonical_reason().unwrap_or("Unknown error").to_owned();
	}

	text.chars().take(REASON_LIMIT).collect()
}

#[cfg(test)]
mod tests {
	// crates.io
	use ::http::StatusCode;
	// self
	use super::*;
	use crate::{
		error::{RejectionKind, TransportError},
		http::{OutboundRequest, TransportFuture},
	};

	/// Transport that answers every call with a canned response and records the last request.
	struct Canned {
		status: StatusCode,
		body: &'static str,
		seen: Mutex<Option<OutboundRequest>>,
	}
	impl Canned {
		fn new(status: StatusCode, body: &'static str) -> Arc<Self> {
			Arc::new(Self { status, body, seen: Mutex::new(None) })
		}

		fn seen(&self) -> OutboundRequest {
			self.seen.lock().clone().expect("A request should have been executed.")
		}
	}
	impl HttpTransport for Canned {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
			*self.seen.lock() = Some(request);

			let response = ApiResponse::new(self.status, self.body.as_bytes().to_vec());

			Box::pin(async move { Ok(response) })
		}
	}

	struct Unreachable;
	impl HttpTransport for Unreachable {
		fn execute(&self, _: OutboundRequest) -> TransportFuture<'_> {
			Box::pin(async {
				Err(TransportError::Io(std::io::Error::other("connection refused")))
			})
		}
	}

	fn descriptor() -> ApiDescriptor {
		ApiDescriptor::builder(
			Url::parse("http://localhost:8000/api").expect("Fixture base URL should parse."),
		)
		.build()
		.expect("Loopback descriptors should build.")
	}

	#[tokio::test]
	async fn sign_in_posts_credentials_without_authorization() {
		let transport = Canned::new(StatusCode::OK, r#"{"access":"A1","refresh":"R1"}"#);
		let identity = IdentityProvider::new(transport.clone(), descriptor());
		let credential =
			identity.sign_in("ada@example.com", "hunter2").await.expect("Sign-in should succeed.");
		let seen = transport.seen();

		assert_eq!(credential.access_token, TokenSecret::new("A1"));
		assert_eq!(credential.refresh_token, TokenSecret::new("R1"));
		assert_eq!(seen.url.as_str(), "http://localhost:8000/api/token/");
		assert_eq!(seen.bearer(), None);

		let body: serde_json::Value = serde_json::from_slice(
			seen.body.as_deref().expect("Sign-in requests should carry a body."),
		)
		.expect("Sign-in body should be JSON.");

		assert_eq!(body, serde_json::json!({ "email": "ada@example.com", "password": "hunter2" }));
	}

	#[tokio::test]
	async fn sign_in_rejection_carries_detail() {
		let transport = Canned::new(
			StatusCode::UNAUTHORIZED,
			r#"{"detail":"No active account found with the given credentials"}"#,
		);
		let err = IdentityProvider::new(transport, descriptor())
			.sign_in("ada@example.com", "wrong")
			.await
			.expect_err("Rejected sign-ins should fail.");

		match err {
			Error::InvalidCredentials { status, reason } => {
				assert_eq!(status, 401);
				assert_eq!(reason, "No active account found with the given credentials");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[tokio::test]
	async fn refresh_keeps_presented_token_when_not_rotated() {
		let transport = Canned::new(StatusCode::OK, r#"{"access":"A2"}"#);
		let identity = IdentityProvider::new(transport.clone(), descriptor());
		let credential = identity
			.refresh(&TokenSecret::new("R1"))
			.await
			.expect("Refresh should succeed.");
		let seen = transport.seen();

		assert_eq!(credential.access_token, TokenSecret::new("A2"));
		assert_eq!(credential.refresh_token, TokenSecret::new("R1"));
		assert_eq!(seen.url.as_str(), "http://localhost:8000/api/token/refresh/");
		assert_eq!(seen.body.as_deref(), Some(&br#"{"refresh":"R1"}"#[..]));
	}

	#[tokio::test]
	async fn refresh_rejections_are_classified() {
		let refused = IdentityProvider::new(
			Canned::new(
				StatusCode::UNAUTHORIZED,
				r#"{"detail":"Token is invalid or expired","code":"token_not_valid"}"#,
			),
			descriptor(),
		)
		.exchange_refresh(&TokenSecret::new("R1"))
		.await
		.expect_err("Provider refusals should reject.");

		assert_eq!(refused.kind, RejectionKind::Provider);
		assert_eq!(refused.status, Some(401));
		assert_eq!(refused.reason, "Token is invalid or expired");

		let malformed = IdentityProvider::new(Canned::new(StatusCode::OK, "<html>"), descriptor())
			.exchange_refresh(&TokenSecret::new("R1"))
			.await
			.expect_err("Unparseable bodies should reject.");

		assert_eq!(malformed.kind, RejectionKind::MalformedResponse);

		let offline = IdentityProvider::new(Arc::new(Unreachable), descriptor())
			.exchange_refresh(&TokenSecret::new("R1"))
			.await
			.expect_err("Unreachable endpoints should reject.");

		assert_eq!(offline.kind, RejectionKind::Transport);
		assert_eq!(offline.status, None);
	}

	#[test]
	fn failure_reason_falls_back_to_text_then_status() {
		assert_eq!(
			failure_reason(&ApiResponse::new(StatusCode::BAD_GATEWAY, b"upstream down".to_vec())),
			"upstream down"
		);
		assert_eq!(
			failure_reason(&ApiResponse::new(StatusCode::BAD_GATEWAY, Vec::new())),
			"Bad Gateway"
		);
	}
}
