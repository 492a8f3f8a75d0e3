//! High-level session flows powered by the [`SessionClient`] facade.

pub mod dispatch;
pub mod refresh;
pub mod session;

pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::Credential,
	ext::SessionObserver,
	http::HttpTransport,
	provider::{ApiDescriptor, IdentityProvider},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Session client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// Authenticated API client for one user session.
///
/// The client owns the transport, the API descriptor, the identity provider, and the refresh
/// coordinator. The coordinator in turn owns the only handle through which the
/// [`CredentialStore`] is mutated on refresh, so the dispatcher, the sign-in/sign-out flows and
/// the refresh cycle all agree on one credential. Cloning the client shares every component.
pub struct SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// HTTP transport used for every outbound request.
	pub transport: Arc<T>,
	/// API descriptor that defines the base URL, identity routes, and auth convention.
	pub descriptor: ApiDescriptor,
	/// Identity provider client used for sign-in (and, by default, refresh).
	pub identity: Arc<IdentityProvider<T>>,
	/// Single-flight refresh coordinator shared by every request sent through this client.
	pub coordinator: Arc<RefreshCoordinator>,
}
impl<T> SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	///
	/// The identity provider built on the same transport becomes the refresh executor.
	pub fn with_transport(
		descriptor: ApiDescriptor,
		store: Arc<CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let transport = transport.into();
		let identity = Arc::new(IdentityProvider::new(transport.clone(), descriptor.clone()));
		let coordinator = Arc::new(RefreshCoordinator::new(store, identity.clone()));

		Self { transport, descriptor, identity, coordinator }
	}

	/// Installs the observer notified when the session can no longer be renewed.
	///
	/// The observer is set on the current coordinator, so a coordinator installed through
	/// [`with_coordinator`](Self::with_coordinator) keeps its executor, and clones sharing the
	/// coordinator see the new observer.
	pub fn with_observer(self, observer: Arc<dyn SessionObserver>) -> Self {
		self.coordinator.set_observer(observer);

		self
	}

	/// Replaces the refresh coordinator, e.g. to plug in a custom [`RefreshExecutor`].
	pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
		self.coordinator = coordinator;

		self
	}

	/// Credential store shared with the coordinator.
	pub fn store(&self) -> &Arc<CredentialStore> {
		self.coordinator.store()
	}

	/// Snapshot of the current credential.
	pub fn credential(&self) -> Option<Credential> {
		self.store().get()
	}

	/// Returns `true` while a credential is held.
	pub fn is_signed_in(&self) -> bool {
		!self.store().is_empty()
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a new client for the provided descriptor and store.
	///
	/// The client provisions its own reqwest-backed transport so callers do not need to pass
	/// HTTP handles explicitly.
	pub fn new(descriptor: ApiDescriptor, store: Arc<CredentialStore>) -> Self {
		Self::with_transport(descriptor, store, ReqwestTransport::default())
	}
}
impl<T> Clone for SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			descriptor: self.descriptor.clone(),
			identity: self.identity.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("descriptor", &self.descriptor)
			.field("signed_in", &self.is_signed_in())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
