//! Ordered registry of callers parked on the in-flight refresh cycle.

// crates.io
use tokio::sync::oneshot::{self, Receiver, Sender};
// self
use crate::{_prelude::*, auth::Credential, error::RefreshRejected};

/// Outcome delivered to every waiter of one cycle.
pub(crate) type RefreshOutcome = Result<Credential, RefreshRejected>;

/// Waiters in admission order, each holding a one-shot completion handle.
///
/// The registry lives inside the coordinator's state lock; admission, withdrawal, and draining
/// all happen under that lock, which is what makes draining and the return to idle atomic.
#[derive(Debug, Default)]
pub(crate) struct WaiterRegistry {
	next_id: u64,
	slots: VecDeque<(u64, Sender<RefreshOutcome>)>,
}
impl WaiterRegistry {
	/// Appends a waiter and returns its id plus the receiving half.
	pub(crate) fn admit(&mut self) -> (u64, Receiver<RefreshOutcome>) {
		let (tx, rx) = oneshot::channel();
		let id = self.next_id;

		self.next_id = self.next_id.wrapping_add(1);
		self.slots.push_back((id, tx));

		(id, rx)
	}

	/// Removes a cancelled waiter; returns whether it was still registered.
	pub(crate) fn withdraw(&mut self, id: u64) -> bool {
		match self.slots.iter().position(|(slot, _)| *slot == id) {
			Some(index) => self.slots.remove(index).is_some(),
			None => false,
		}
	}

	/// Number of registered waiters.
	pub(crate) fn len(&self) -> usize {
		self.slots.len()
	}

	/// Resolves every waiter with `outcome` in admission order and empties the registry.
	pub(crate) fn settle(&mut self, outcome: &RefreshOutcome) -> usize {
		let released = self.slots.len();

		for (_, tx) in self.slots.drain(..) {
			// A closed receiver belongs to a waiter that is already unwinding.
			let _ = tx.send(outcome.clone());
		}

		released
	}

	/// Drops every completion handle without resolving it.
	///
	/// Receivers observe a closed channel and re-enter the coordinator.
	pub(crate) fn abandon(&mut self) -> usize {
		let woken = self.slots.len();

		self.slots.clear();

		woken
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn settle_resolves_in_admission_order() {
		let mut registry = WaiterRegistry::default();
		let (_, mut first) = registry.admit();
		let (_, mut second) = registry.admit();
		let outcome = Ok(Credential::new("A2", "R2"));

		assert_eq!(registry.settle(&outcome), 2);
		assert_eq!(registry.len(), 0);
		assert_eq!(first.try_recv().expect("First waiter should be resolved."), outcome);
		assert_eq!(second.try_recv().expect("Second waiter should be resolved."), outcome);
	}

	#[test]
	fn withdrawn_waiters_are_not_resolved() {
		let mut registry = WaiterRegistry::default();
		let (first_id, _first) = registry.admit();
		let (_, mut second) = registry.admit();

		assert!(registry.withdraw(first_id));
		assert!(!registry.withdraw(first_id));
		assert_eq!(registry.len(), 1);
		assert_eq!(
			registry.settle(&Err(RefreshRejected::missing_refresh_token())),
			1,
			"Only the remaining waiter should be released."
		);
		assert!(second.try_recv().expect("Remaining waiter should be resolved.").is_err());
	}

	#[test]
	fn abandon_closes_every_channel() {
		let mut registry = WaiterRegistry::default();
		let (_, mut receiver) = registry.admit();

		assert_eq!(registry.abandon(), 1);
		assert!(matches!(receiver.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
	}
}
