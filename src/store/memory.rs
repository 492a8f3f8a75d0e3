//! Thread-safe in-memory [`CredentialBackend`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialBackend, StoreFuture},
};

type Slot = Arc<RwLock<Option<Credential>>>;

/// Backend that keeps the persisted credential in-process.
///
/// Clones share the same slot, so a test can keep a handle and inspect what the store persisted.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend(Slot);
impl MemoryBackend {
	/// Creates a backend that already holds `credential`.
	pub fn seeded(credential: Credential) -> Self {
		Self(Arc::new(RwLock::new(Some(credential))))
	}

	/// Returns the persisted credential without going through the async contract.
	pub fn snapshot(&self) -> Option<Credential> {
		self.0.read().clone()
	}
}
impl CredentialBackend for MemoryBackend {
	fn load(&self) -> StoreFuture<'_, Option<Credential>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save(&self, credential: Credential) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(credential);

			Ok(())
		})
	}

	fn erase(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
