#![allow(dead_code)]

// std
use std::{
	future::Future,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use tokio::sync::Semaphore;
use url::Url;
// self
use session_broker::{
	auth::{Credential, TokenSecret},
	error::RefreshRejected,
	flows::{RefreshExecutor, RefreshFuture},
	provider::ApiDescriptor,
	store::CredentialStore,
};

/// Builds a descriptor rooted at `<base>/api/`.
pub fn descriptor(base: &str) -> ApiDescriptor {
	ApiDescriptor::builder(
		Url::parse(&format!("{base}/api/")).expect("Mock base URL should parse successfully."),
	)
	.build()
	.expect("Loopback descriptor should build successfully.")
}

/// Creates an in-memory store holding `access`/`refresh`.
pub async fn seeded_store(access: &str, refresh: &str) -> Arc<CredentialStore> {
	let store = Arc::new(CredentialStore::in_memory());

	store.set(Credential::new(access, refresh)).await.expect("Failed to seed the credential store.");

	store
}

/// Polls `condition` until it holds, failing the test after a generous deadline.
pub async fn wait_until<F>(what: &str, condition: F)
where
	F: Fn() -> bool,
{
	for _ in 0..1_000 {
		if condition() {
			return;
		}

		tokio::time::sleep(StdDuration::from_millis(5)).await;
	}

	panic!("Timed out waiting until {what}.");
}

/// Runs `fut` with a deadline so a lost wakeup fails instead of hanging.
pub async fn within<F>(what: &str, fut: F) -> F::Output
where
	F: Future,
{
	tokio::time::timeout(StdDuration::from_secs(5), fut)
		.await
		.unwrap_or_else(|_| panic!("Timed out waiting for {what}."))
}

/// What a [`GatedExecutor`] returns for its n-th call (1-based).
pub type Script = fn(usize, &TokenSecret) -> Result<Credential, RefreshRejected>;

/// Executor that parks every call until the test opens the gate.
pub struct GatedExecutor {
	calls: AtomicUsize,
	gate: Semaphore,
	script: Script,
}
impl GatedExecutor {
	pub fn new(script: Script) -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), gate: Semaphore::new(0), script })
	}

	/// Issues `A{n+1}`/`R{n+1}` on the n-th call.
	pub fn rotating() -> Arc<Self> {
		Self::new(|n, _| Ok(Credential::new(format!("A{}", n + 1), format!("R{}", n + 1))))
	}

	/// Rejects every call the way an expired refresh token is rejected.
	pub fn refusing() -> Arc<Self> {
		Self::new(|_, _| Err(RefreshRejected::provider(401, "Token is invalid or expired")))
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Lets `n` parked (or future) calls proceed.
	pub fn release(&self, n: usize) {
		self.gate.add_permits(n);
	}
}
impl RefreshExecutor for GatedExecutor {
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(async move {
			let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			self.gate.acquire().await.expect("Gate semaphore should stay open.").forget();

			(self.script)(n, refresh_token)
		})
	}
}
