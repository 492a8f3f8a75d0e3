//! Single-flight refresh orchestration.
//!
//! [`RefreshCoordinator`] guarantees that at most one refresh call is outstanding per session.
//! The first caller that finds the coordinator idle becomes the cycle's leader and invokes the
//! [`RefreshExecutor`]; everyone arriving while the cycle runs is parked in an ordered waiter
//! registry and resolved with the leader's outcome. Settling the cycle drains the registry and
//! returns the coordinator to idle under one lock acquisition, so a caller either joins the
//! current cycle or starts the next one, never neither.
//!
//! Successful refreshes rotate the stored credential through
//! [`CredentialStore::rotate`]; rejections clear it through [`CredentialStore::clear_if`] and
//! raise the session-expired signal once for the whole cycle.

mod metrics;
mod waiters;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::sync::oneshot::Receiver;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	error::{RefreshRejected, RejectionKind},
	ext::{NoopSessionObserver, SessionObserver},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CompareAndSwapOutcome, CredentialStore},
};
use waiters::{RefreshOutcome, WaiterRegistry};

/// Boxed future returned by [`RefreshExecutor::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Credential, RefreshRejected>> + 'a + Send>>;

/// Performs the network exchange of a refresh token for a new credential.
///
/// The executor only talks to the identity provider; it never touches the store or the
/// coordinator. A refresh response without a new refresh token should reuse the presented one.
pub trait RefreshExecutor
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for a new credential.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

/// Externally visible coordinator phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorPhase {
	/// No refresh is in flight.
	Idle,
	/// A refresh cycle is in flight.
	Refreshing {
		/// Monotonic cycle number, starting at 1.
		cycle: u64,
	},
}

#[derive(Debug)]
struct CoordinatorState {
	phase: CoordinatorPhase,
	waiters: WaiterRegistry,
	cycles: u64,
}

/// Single-flight coordinator shared by every request of one session.
pub struct RefreshCoordinator {
	store: Arc<CredentialStore>,
	executor: Arc<dyn RefreshExecutor>,
	observer: RwLock<Arc<dyn SessionObserver>>,
	metrics: RefreshMetrics,
	state: Mutex<CoordinatorState>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator with no session observer.
	pub fn new(store: Arc<CredentialStore>, executor: Arc<dyn RefreshExecutor>) -> Self {
		Self {
			store,
			executor,
			observer: RwLock::new(Arc::new(NoopSessionObserver)),
			metrics: Default::default(),
			state: Mutex::new(CoordinatorState {
				phase: CoordinatorPhase::Idle,
				waiters: WaiterRegistry::default(),
				cycles: 0,
			}),
		}
	}

	/// Installs the observer notified once per rejected cycle.
	pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
		*self.observer.get_mut() = observer;

		self
	}

	/// Replaces the observer of a coordinator that is already shared.
	///
	/// Cycles that settle after this call notify `observer`; the executor and any in-flight
	/// cycle are left untouched.
	pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
		*self.observer.write() = observer;
	}

	/// Store the coordinator rotates and clears.
	pub fn store(&self) -> &Arc<CredentialStore> {
		&self.store
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Current phase.
	pub fn phase(&self) -> CoordinatorPhase {
		self.state.lock().phase
	}

	/// Returns `true` while a cycle is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(self.phase(), CoordinatorPhase::Refreshing { .. })
	}

	/// Number of callers parked on the current cycle.
	pub fn waiter_count(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Obtains a refreshed credential, starting a cycle or joining the one in flight.
	pub async fn obtain_refreshed_credential(&self) -> Result<Credential, RefreshRejected> {
		self.obtain_refreshed_credential_since(None).await
	}

	/// Obtains a credential newer than `rejected`.
	///
	/// When the coordinator is idle and the store already holds an access token other than
	/// `rejected`, a cycle that settled while the caller's request was in flight already replaced
	/// it; that credential is returned without contacting the identity provider. An empty store
	/// yields a [`RejectionKind::MissingRefreshToken`] rejection without starting a cycle.
	pub async fn obtain_refreshed_credential_since(
		&self,
		rejected: Option<&TokenSecret>,
	) -> Result<Credential, RefreshRejected> {
		const KIND: FlowKind = FlowKind::Refresh;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = loop {
			match self.enter(rejected) {
				Entry::Settled(outcome) => break outcome,
				Entry::Leader(ticket) => break self.lead(ticket).await,
				Entry::Waiter(slot) => match slot.wait().await {
					Some(outcome) => break outcome,
					// The leader was dropped before settling; re-enter and compete again.
					None => continue,
				},
			}
		};

		obs::record_flow_result(KIND, &result);

		result
	}

	fn enter(&self, rejected: Option<&TokenSecret>) -> Entry<'_> {
		let mut state = self.state.lock();

		if let CoordinatorPhase::Refreshing { .. } = state.phase {
			let (id, receiver) = state.waiters.admit();

			self.metrics.record_coalesced();

			return Entry::Waiter(WaiterSlot { coordinator: self, id, receiver, settled: false });
		}

		let Some(current) = self.store.get() else {
			return Entry::Settled(Err(RefreshRejected::missing_refresh_token()));
		};

		if rejected.is_some_and(|rejected| current.access_token != *rejected) {
			return Entry::Settled(Ok(current));
		}

		state.cycles += 1;

		let cycle = state.cycles;

		state.phase = CoordinatorPhase::Refreshing { cycle };

		Entry::Leader(LeaderTicket { cycle, refresh_token: current.refresh_token })
	}

	async fn lead(&self, ticket: LeaderTicket) -> RefreshOutcome {
		let span = FlowSpan::new(FlowKind::Refresh, "lead");
		let mut guard = LeaderGuard { coordinator: self, span: span.clone(), armed: true };

		span.record_credential(&ticket.refresh_token.fingerprint());

		let outcome = span.instrument(self.run_cycle(&ticket.refresh_token, &span)).await;

		guard.armed = false;

		self.settle(ticket.cycle, &outcome);

		match &outcome {
			Ok(credential) => {
				self.metrics.record_success();
				span.record_credential(&credential.access_token.fingerprint());
				span.debug("refresh cycle settled with a new credential");
			},
			Err(rejection) => {
				self.metrics.record_failure();
				span.warn("refresh cycle rejected; session torn down", rejection);

				if rejection.kind != RejectionKind::SessionReplaced {
					let observer = self.observer.read().clone();

					observer.session_expired(rejection);
				}
			},
		}

		outcome
	}

	async fn run_cycle(&self, refresh_token: &TokenSecret, span: &FlowSpan) -> RefreshOutcome {
		self.metrics.record_attempt();

		match self.executor.refresh(refresh_token).await {
			Ok(credential) => match self.store.rotate(refresh_token, credential.clone()).await {
				Ok(CompareAndSwapOutcome::Updated) => Ok(credential),
				// A sign-in replaced the session mid-cycle; hand out the newer credential.
				Ok(CompareAndSwapOutcome::RefreshMismatch) =>
					self.store.get().ok_or_else(RefreshRejected::session_replaced),
				Ok(CompareAndSwapOutcome::Missing) => Err(RefreshRejected::session_replaced()),
				Err(e) => {
					span.warn("refreshed credential could not be persisted", &e);

					Ok(credential)
				},
			},
			Err(rejection) => match self.store.clear_if(refresh_token).await {
				Ok(true) => Err(rejection),
				// A sign-in or sign-out replaced the session mid-cycle; the rejection is stale.
				Ok(false) => self.store.get().ok_or_else(RefreshRejected::session_replaced),
				Err(e) => {
					span.warn("rejected credential could not be erased", &e);

					Err(rejection)
				},
			},
		}
	}

	fn settle(&self, cycle: u64, outcome: &RefreshOutcome) {
		let mut state = self.state.lock();

		debug_assert_eq!(state.phase, CoordinatorPhase::Refreshing { cycle });

		state.waiters.settle(outcome);
		state.phase = CoordinatorPhase::Idle;
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("phase", &state.phase)
			.field("waiters", &state.waiters.len())
			.field("metrics", &self.metrics)
			.finish()
	}
}

enum Entry<'a> {
	Settled(RefreshOutcome),
	Leader(LeaderTicket),
	Waiter(WaiterSlot<'a>),
}

struct LeaderTicket {
	cycle: u64,
	refresh_token: TokenSecret,
}

/// Returns the coordinator to idle if the leader is dropped mid-cycle.
struct LeaderGuard<'a> {
	coordinator: &'a RefreshCoordinator,
	span: FlowSpan,
	armed: bool,
}
impl Drop for LeaderGuard<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		let woken = {
			let mut state = self.coordinator.state.lock();

			state.phase = CoordinatorPhase::Idle;

			state.waiters.abandon()
		};

		self.coordinator.metrics.record_abandoned();
		self.span.warn(
			"refresh leader dropped before settling; waiters re-enter",
			&format_args!("{woken} waiter(s) woken"),
		);
	}
}

/// Registered waiter; withdraws itself from the registry when cancelled.
struct WaiterSlot<'a> {
	coordinator: &'a RefreshCoordinator,
	id: u64,
	receiver: Receiver<RefreshOutcome>,
	settled: bool,
}
impl WaiterSlot<'_> {
	/// Resolves with the cycle's outcome, or `None` if the cycle was abandoned.
	async fn wait(mut self) -> Option<RefreshOutcome> {
		let received = (&mut self.receiver).await.ok();

		self.settled = true;

		received
	}
}
impl Drop for WaiterSlot<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.state.lock().waiters.withdraw(self.id);
		}
	}
}
