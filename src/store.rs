//! Credential storage: the durable backend contract and the in-process store built on top of it.
//!
//! [`CredentialStore`] is the single owner of the current [`Credential`]. Reads are lock-free
//! snapshots taken under a short read lock, so they never wait on disk or network work. Every
//! mutation is serialized through an async write guard, applied to the in-memory cell first, and
//! then persisted through the configured [`CredentialBackend`].

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
};

/// Boxed future returned by [`CredentialBackend`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable process-local storage consumed by [`CredentialStore`].
pub trait CredentialBackend
where
	Self: Send + Sync,
{
	/// Loads the persisted credential, if any.
	fn load(&self) -> StoreFuture<'_, Option<Credential>>;

	/// Persists the credential, replacing whatever was stored.
	fn save(&self, credential: Credential) -> StoreFuture<'_, ()>;

	/// Removes the persisted credential. Erasing an empty backend succeeds.
	fn erase(&self) -> StoreFuture<'_, ()>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh token matched the expected value and the credential was replaced.
	Updated,
	/// A credential exists but carries a different refresh token.
	RefreshMismatch,
	/// No credential is stored.
	Missing,
}

/// Error type produced by [`CredentialBackend`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Owner of the current credential shared by the dispatcher and the refresh coordinator.
pub struct CredentialStore {
	current: RwLock<Option<Credential>>,
	backend: Arc<dyn CredentialBackend>,
	write_guard: AsyncMutex<()>,
}
impl CredentialStore {
	/// Opens a store seeded from whatever the backend has persisted.
	pub async fn open(backend: Arc<dyn CredentialBackend>) -> Result<Self, StoreError> {
		let loaded = backend.load().await?;

		Ok(Self { current: RwLock::new(loaded), backend, write_guard: AsyncMutex::new(()) })
	}

	/// Creates an empty store backed by a fresh [`MemoryBackend`].
	pub fn in_memory() -> Self {
		Self::with_backend(Arc::new(MemoryBackend::default()), None)
	}

	/// Creates a store with an explicit initial value, skipping the backend load.
	pub fn with_backend(backend: Arc<dyn CredentialBackend>, initial: Option<Credential>) -> Self {
		Self { current: RwLock::new(initial), backend, write_guard: AsyncMutex::new(()) }
	}

	/// Returns a snapshot of the current credential.
	pub fn get(&self) -> Option<Credential> {
		self.current.read().clone()
	}

	/// Returns `true` when no credential is held.
	pub fn is_empty(&self) -> bool {
		self.current.read().is_none()
	}

	/// Replaces the current credential and persists it.
	///
	/// The in-memory value is visible to readers before persistence completes; a persistence
	/// failure is returned but does not roll the in-memory value back.
	pub async fn set(&self, credential: Credential) -> Result<(), StoreError> {
		let _serial = self.write_guard.lock().await;

		*self.current.write() = Some(credential.clone());

		self.backend.save(credential).await
	}

	/// Drops the current credential and erases it from the backend.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let _serial = self.write_guard.lock().await;

		*self.current.write() = None;

		self.backend.erase().await
	}

	/// Installs `replacement` only if the stored refresh token still equals `expected_refresh`.
	pub async fn rotate(
		&self,
		expected_refresh: &TokenSecret,
		replacement: Credential,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		let _serial = self.write_guard.lock().await;
		let outcome = {
			let mut current = self.current.write();
			let outcome = match current.as_ref() {
				Some(existing) if existing.refresh_token == *expected_refresh =>
					CompareAndSwapOutcome::Updated,
				Some(_) => CompareAndSwapOutcome::RefreshMismatch,
				None => CompareAndSwapOutcome::Missing,
			};

			if matches!(outcome, CompareAndSwapOutcome::Updated) {
				*current = Some(replacement.clone());
			}

			outcome
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			self.backend.save(replacement).await?;
		}

		Ok(outcome)
	}

	/// Clears the store only if it still holds `expected_refresh`; returns whether it did.
	pub async fn clear_if(&self, expected_refresh: &TokenSecret) -> Result<bool, StoreError> {
		let _serial = self.write_guard.lock().await;
		let cleared = {
			let mut current = self.current.write();

			if current.as_ref().is_some_and(|existing| existing.refresh_token == *expected_refresh) {
				*current = None;

				true
			} else {
				false
			}
		};

		if cleared {
			self.backend.erase().await?;
		}

		Ok(cleared)
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore").field("current", &*self.current.read()).finish()
	}
}
