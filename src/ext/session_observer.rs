//! Session-expired signal consumed by the UI/session layer.

// self
use crate::{_prelude::*, error::RefreshRejected};

/// Receives the session-expired signal once per rejected refresh cycle.
///
/// Implementations should clear cached user-identity state and route the user back to
/// sign-in. The callback runs on the task that led the failed cycle, after the credential store
/// was cleared and every waiter was rejected, so it must not block.
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// Called when the identity provider refused to renew the session.
	fn session_expired(&self, rejection: &RefreshRejected);
}
impl<F> SessionObserver for F
where
	F: Fn(&RefreshRejected) + Send + Sync,
{
	fn session_expired(&self, rejection: &RefreshRejected) {
		self(rejection)
	}
}

/// Observer that ignores the signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionObserver;
impl SessionObserver for NoopSessionObserver {
	fn session_expired(&self, _: &RefreshRejected) {}
}

/// Observer that republishes the signal on a [`tokio::sync::watch`] channel.
///
/// Subscribers see the latest rejection; repeated expiries collapse into one pending change,
/// which keeps the notification idempotent for UI consumers.
#[derive(Debug)]
pub struct WatchSessionObserver(tokio::sync::watch::Sender<Option<RefreshRejected>>);
impl WatchSessionObserver {
	/// Creates the observer and its first receiver.
	pub fn channel() -> (Self, tokio::sync::watch::Receiver<Option<RefreshRejected>>) {
		let (tx, rx) = tokio::sync::watch::channel(None);

		(Self(tx), rx)
	}

	/// Creates an additional receiver.
	pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Option<RefreshRejected>> {
		self.0.subscribe()
	}
}
impl SessionObserver for WatchSessionObserver {
	fn session_expired(&self, rejection: &RefreshRejected) {
		self.0.send_replace(Some(rejection.clone()));
	}
}
