//! Sign-in and sign-out flows that install and tear down the session credential.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	http::{HttpTransport, RequestDescriptor},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::identity,
};

#[derive(Serialize)]
struct LogoutRequest<'a> {
	refresh_token: &'a str,
}

impl<T> super::SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges email and password for a credential and installs it in the store.
	///
	/// A successful sign-in replaces whatever session was held before, including one a refresh
	/// cycle is currently rotating; that cycle then hands out the new credential.
	pub async fn sign_in(&self, email: &str, password: &str) -> Result<Credential> {
		const KIND: FlowKind = FlowKind::SignIn;

		let span = FlowSpan::new(KIND, "sign_in");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let credential = self.identity.sign_in(email, password).await?;

				span.record_credential(&credential.access_token.fingerprint());
				self.store().set(credential.clone()).await?;

				Ok(credential)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Revokes the refresh token remotely, then clears the local session.
	///
	/// The local session is cleared even when the remote call fails; the remote failure is then
	/// returned. A refresh rejected during the logout call counts as signed out.
	pub async fn sign_out(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::SignOut;

		let span = FlowSpan::new(KIND, "sign_out");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let Some(credential) = self.credential() else {
					span.debug("no session held; nothing to revoke");

					return Ok(());
				};

				span.record_credential(&credential.refresh_token.fingerprint());

				let mut request = RequestDescriptor::post(self.descriptor.endpoints.logout.as_str());
				// A refresh during logout rotates the refresh token; revoke the rotated one.
				let bind = |request: &mut RequestDescriptor, credential: &Credential| {
					request.set_json(&LogoutRequest {
						refresh_token: credential.refresh_token.expose(),
					})
				};
				let remote = match bind(&mut request, &credential) {
					Ok(()) => self.send_rebinding(&mut request, bind).await,
					Err(e) => Err(e.into()),
				};

				self.store().clear().await?;

				match remote {
					Ok(response) if response.is_success() => Ok(()),
					Ok(response) => {
						let reason = identity::failure_reason(&response);

						span.warn("logout rejected remotely; local session cleared", &reason);

						Err(Error::LogoutRejected { status: response.status.as_u16(), reason })
					},
					Err(Error::SessionExpired(rejection)) => {
						span.warn("session already expired during logout", &rejection);

						Ok(())
					},
					Err(e) => {
						span.warn("logout call failed; local session cleared", &e);

						Err(e)
					},
				}
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use ::http::StatusCode;
	// self
	use super::*;
	use crate::{
		auth::TokenSecret,
		error::TransportError,
		flows::SessionClient,
		http::{ApiResponse, OutboundRequest, TransportFuture},
		provider::ApiDescriptor,
		store::{CredentialStore, MemoryBackend},
	};

	/// Answers sign-in with a fixed pair and logout with a configurable status.
	struct Provider {
		logout: Option<StatusCode>,
		logouts: AtomicUsize,
	}
	impl HttpTransport for Provider {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
			let response = if request.url.path().ends_with("/token/") {
				Ok(ApiResponse::new(StatusCode::OK, br#"{"access":"A1","refresh":"R1"}"#.to_vec()))
			} else {
				self.logouts.fetch_add(1, Ordering::SeqCst);

				match self.logout {
					Some(status) => Ok(ApiResponse::new(status, Vec::new())),
					None => Err(TransportError::Io(std::io::Error::other("network down"))),
				}
			};

			Box::pin(async move { response })
		}
	}

	fn session_client(logout: Option<StatusCode>) -> (SessionClient<Provider>, MemoryBackend) {
		let backend = MemoryBackend::default();
		let store = Arc::new(CredentialStore::with_backend(Arc::new(backend.clone()), None));
		let descriptor = ApiDescriptor::builder(
			Url::parse("http://127.0.0.1:8000/api/").expect("Fixture base URL should parse."),
		)
		.build()
		.expect("Loopback descriptors should build.");
		let transport = Provider { logout, logouts: AtomicUsize::new(0) };

		(SessionClient::with_transport(descriptor, store, transport), backend)
	}

	#[tokio::test]
	async fn sign_in_installs_and_persists_credential() {
		let (client, backend) = session_client(Some(StatusCode::OK));

		assert!(!client.is_signed_in());

		let credential =
			client.sign_in("ada@example.com", "hunter2").await.expect("Sign-in should succeed.");

		assert!(client.is_signed_in());
		assert_eq!(client.credential(), Some(credential.clone()));
		assert_eq!(backend.snapshot(), Some(credential));
	}

	#[tokio::test]
	async fn sign_out_clears_session() {
		let (client, backend) = session_client(Some(StatusCode::OK));

		client.sign_in("ada@example.com", "hunter2").await.expect("Sign-in should succeed.");
		client.sign_out().await.expect("Sign-out should succeed.");

		assert!(!client.is_signed_in());
		assert_eq!(backend.snapshot(), None);
		assert_eq!(client.transport.logouts.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn sign_out_clears_session_even_when_remote_fails() {
		let (client, _) = session_client(None);

		client.sign_in("ada@example.com", "hunter2").await.expect("Sign-in should succeed.");

		let err = client.sign_out().await.expect_err("Remote failures should be reported.");

		assert!(matches!(err, Error::Transport(_)));
		assert!(!client.is_signed_in());

		let (client, _) = session_client(Some(StatusCode::BAD_REQUEST));

		client.sign_in("ada@example.com", "hunter2").await.expect("Sign-in should succeed.");

		let err = client.sign_out().await.expect_err("Remote rejections should be reported.");

		assert!(matches!(err, Error::LogoutRejected { status: 400, .. }));
		assert!(!client.is_signed_in());
	}

	#[tokio::test]
	async fn sign_out_without_session_is_a_no_op() {
		let (client, _) = session_client(Some(StatusCode::OK));

		client.sign_out().await.expect("Signing out twice should succeed.");

		assert_eq!(client.transport.logouts.load(Ordering::SeqCst), 0);
		assert_eq!(client.credential().map(|c| c.access_token), None::<TokenSecret>);
	}

	#[tokio::test]
	async fn sign_out_revokes_the_refresh_token_rotated_during_logout() {
		/// Refuses `A1`, rotates `R1` into `A2`/`R2`, and records every logout body.
		struct Rotates {
			logout_bodies: parking_lot::Mutex<Vec<String>>,
		}
		impl HttpTransport for Rotates {
			fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
				let response = if request.url.path().ends_with("/token/refresh/") {
					ApiResponse::new(StatusCode::OK, br#"{"access":"A2","refresh":"R2"}"#.to_vec())
				} else if request.bearer() == Some("A2") {
					self.logout_bodies.lock().push(String::from_utf8_lossy(
						request.body.as_deref().unwrap_or_default(),
					)
					.into_owned());

					ApiResponse::new(StatusCode::RESET_CONTENT, Vec::new())
				} else {
					ApiResponse::new(StatusCode::UNAUTHORIZED, Vec::new())
				};

				Box::pin(async move { Ok(response) })
			}
		}

		let store = Arc::new(CredentialStore::in_memory());

		store.set(Credential::new("A1", "R1")).await.expect("Seeding the store should succeed.");

		let descriptor = ApiDescriptor::builder(
			Url::parse("http://127.0.0.1:8000/api/").expect("Fixture base URL should parse."),
		)
		.build()
		.expect("Loopback descriptors should build.");
		let client = SessionClient::with_transport(
			descriptor,
			store,
			Rotates { logout_bodies: Default::default() },
		);

		client.sign_out().await.expect("Sign-out should succeed after the refresh.");

		assert!(!client.is_signed_in());
		assert_eq!(*client.transport.logout_bodies.lock(), vec![r#"{"refresh_token":"R2"}"#]);
	}
}
