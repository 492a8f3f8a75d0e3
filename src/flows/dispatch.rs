//! Authenticated dispatch with one-shot replay after a refresh.
//!
//! [`SessionClient::send`](super::SessionClient::send) attaches the current credential, executes
//! the request, and on the convention's unauthorized status asks the
//! [`RefreshCoordinator`](super::RefreshCoordinator) for a newer credential before replaying the
//! request exactly once. Requests that succeed never touch the coordinator; a request that is
//! rejected again after its replay is returned as-is.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::ConfigError,
	http::{ApiResponse, HttpTransport, RequestDescriptor},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<T> super::SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Sends `request` with the current credential, refreshing and replaying once on rejection.
	///
	/// Returns [`Error::SessionExpired`] when the refresh cycle the request joined was rejected.
	/// Transport failures are returned unchanged and never trigger a refresh.
	pub async fn send(&self, mut request: RequestDescriptor) -> Result<ApiResponse> {
		self.send_tracked(&mut request).await
	}

	/// Same as [`send`](Self::send), leaving the replay flag observable on `request`.
	pub async fn send_tracked(&self, request: &mut RequestDescriptor) -> Result<ApiResponse> {
		self.send_rebinding(request, |_, _| Ok(())).await
	}

	/// Dispatches `request`, letting `rebind` rewrite it for the refreshed credential before the
	/// replay. Used by requests whose body embeds credential material.
	pub(super) async fn send_rebinding<F>(
		&self,
		request: &mut RequestDescriptor,
		rebind: F,
	) -> Result<ApiResponse>
	where
		F: Fn(&mut RequestDescriptor, &Credential) -> Result<(), ConfigError>,
	{
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let credential = self.store().get();

				if let Some(credential) = &credential {
					span.record_credential(&credential.access_token.fingerprint());
				}

				let response = self.execute(request, credential.as_ref()).await?;

				if !self.descriptor.is_unauthorized(response.status) || !request.mark_retried() {
					return Ok(response);
				}

				span.debug("request rejected as unauthorized; awaiting a refreshed credential");

				let rejected = credential.map(|credential| credential.access_token);
				let refreshed = self
					.coordinator
					.obtain_refreshed_credential_since(rejected.as_ref())
					.await
					.map_err(Error::SessionExpired)?;

				span.record_credential(&refreshed.access_token.fingerprint());
				span.debug("replaying request with the refreshed credential");
				rebind(request, &refreshed)?;

				self.execute(request, Some(&refreshed)).await
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	async fn execute(
		&self,
		request: &RequestDescriptor,
		credential: Option<&Credential>,
	) -> Result<ApiResponse> {
		let outbound = request.to_outbound(&self.descriptor, credential)?;

		Ok(self.transport.execute(outbound).await?)
	}
}
