use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::Error;
use crate::store::{Change, ChangeOp, Keyed, Scope, State};
use crate::types::meta::new_uid;
use crate::types::ResourceIdentifier;

/// In-memory store. Readers take a wait-free `Arc` snapshot of the committed
/// state; writers are serialised through a tokio mutex and commit by swapping
/// the snapshot, so a transaction is either fully visible or not at all.
#[derive(Debug)]
pub struct MemStore {
	current: RwLock<Arc<State>>,
	write_gate: Arc<tokio::sync::Mutex<()>>,
	sync_status: RwLock<Option<DateTime<Utc>>>,
}

impl Default for MemStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemStore {
	pub fn new() -> Self {
		Self {
			current: RwLock::new(Arc::new(State::default())),
			write_gate: Arc::new(tokio::sync::Mutex::new(())),
			sync_status: RwLock::new(None),
		}
	}

	/// A consistent snapshot of the committed state. Never blocks writers.
	pub fn snapshot(&self) -> Arc<State> {
		self.current.read().clone()
	}

	/// Open a write transaction. Awaits until the single writer slot frees up.
	pub async fn begin(&self) -> Tx<'_> {
		let guard = self.write_gate.clone().lock_owned().await;
		let base = self.snapshot();
		Tx {
			store: self,
			_guard: guard,
			work: (*base).clone(),
			base,
			changes: Vec::new(),
		}
	}

	/// Timestamp of the most recent successful downstream publish.
	pub fn sync_status(&self) -> Option<DateTime<Utc>> {
		*self.sync_status.read()
	}

	pub fn set_sync_status(&self, at: DateTime<Utc>) {
		*self.sync_status.write() = Some(at);
	}
}

/// A write transaction over a private copy of the state. Dropping the
/// transaction without calling [`Tx::commit`] aborts it; nothing becomes
/// visible and the writer slot is released.
pub struct Tx<'a> {
	store: &'a MemStore,
	_guard: tokio::sync::OwnedMutexGuard<()>,
	base: Arc<State>,
	work: State,
	changes: Vec<Change>,
}

impl Tx<'_> {
	/// The working state, including uncommitted mutations.
	pub fn state(&self) -> &State {
		&self.work
	}

	pub fn state_mut(&mut self) -> &mut State {
		&mut self.work
	}

	/// The committed state this transaction started from.
	pub fn base(&self) -> &State {
		&self.base
	}

	/// Owned handle to the pre-transaction state, for callers that need to
	/// walk it while mutating the working state.
	pub fn base_arc(&self) -> Arc<State> {
		self.base.clone()
	}

	pub fn changes(&self) -> &[Change] {
		&self.changes
	}

	pub fn record(&mut self, change: Change) {
		self.changes.push(change);
	}

	/// Insert or replace one item, applying the Meta discipline:
	/// - creation assigns a fresh immutable UID and a creation timestamp,
	/// - `Generation` bumps iff the spec changed,
	/// - `ResourceVersion` bumps iff the stored bytes changed,
	/// - a non-zero caller-supplied `ResourceVersion` must match the stored
	///   one (optimistic concurrency), otherwise the write conflicts.
	///
	/// Returns whether the table actually changed.
	pub fn upsert<T: Keyed>(&mut self, item: T) -> Result<bool, Error> {
		let id = item.id();
		match T::table(&self.work).get(&id) {
			Some(prev) => {
				let expected = item.meta().resource_version;
				if expected != 0 && expected != prev.meta().resource_version {
					return Err(Error::Conflict(format!(
						"{} {id}: resource version {expected} does not match stored {}",
						T::KIND,
						prev.meta().resource_version
					)));
				}
				let spec_changed = !prev.spec_eq(&item);
				let prev = prev.clone();
				let mut next = item;
				// Server-owned meta carries over; caller-supplied conditions
				// (decoder warnings) merge by type.
				let incoming_conditions = std::mem::take(&mut next.meta_mut().conditions);
				let labels = std::mem::take(&mut next.meta_mut().labels);
				let annotations = std::mem::take(&mut next.meta_mut().annotations);
				*next.meta_mut() = prev.meta().clone();
				next.meta_mut().labels = labels;
				next.meta_mut().annotations = annotations;
				let now = Utc::now();
				for c in incoming_conditions {
					next
						.meta_mut()
						.set_condition(&c.type_, c.status, &c.reason, &c.message, now);
				}
				if spec_changed {
					next.meta_mut().generation += 1;
				}
				if next == prev {
					return Ok(false);
				}
				next.meta_mut().resource_version = prev.meta().resource_version + 1;
				T::table_mut(&mut self.work).insert(next);
				self.changes.push(Change {
					kind: T::KIND,
					id,
					op: ChangeOp::Upsert,
				});
				Ok(true)
			},
			None => {
				let mut next = item;
				let meta = next.meta_mut();
				meta.uid = new_uid();
				meta.resource_version = 1;
				meta.generation = 1;
				meta.observed_generation = 0;
				meta.creation_timestamp = Some(Utc::now());
				T::table_mut(&mut self.work).insert(next);
				self.changes.push(Change {
					kind: T::KIND,
					id,
					op: ChangeOp::Upsert,
				});
				Ok(true)
			},
		}
	}

	/// Remove by identity. Absent items are a silent success.
	pub fn delete<T: Keyed>(&mut self, id: &ResourceIdentifier) -> bool {
		if T::table_mut(&mut self.work).remove(id).is_some() {
			self.changes.push(Change {
				kind: T::KIND,
				id: id.clone(),
				op: ChangeOp::Delete,
			});
			true
		} else {
			false
		}
	}

	/// Replace-all within scope: after this call the scoped slice of the
	/// table equals `items` exactly.
	pub fn sync_kind<T: Keyed>(&mut self, items: Vec<T>, scope: &Scope) -> Result<(), Error> {
		let keep: std::collections::BTreeSet<ResourceIdentifier> =
			items.iter().map(|i| i.id()).collect();
		let stale: Vec<ResourceIdentifier> = T::table(&self.work)
			.ids()
			.filter(|id| scope.matches(id) && !keep.contains(id))
			.cloned()
			.collect();
		for id in stale {
			self.delete::<T>(&id);
		}
		for item in items {
			self.upsert(item)?;
		}
		Ok(())
	}

	/// Atomically publish the working state. Returns the change log.
	pub fn commit(self) -> Vec<Change> {
		debug!(changes = self.changes.len(), "committing transaction");
		*self.store.current.write() = Arc::new(self.work);
		self.changes
	}
}
