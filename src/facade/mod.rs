
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::Error;
use crate::reconcile;
use crate::store::{Change, ChangeOp, Keyed, MemStore, Scope, Tx, for_each_meta_mut};
use crate::sync::{Delta, SyncHandle};
use crate::types::meta::{ConditionStatus, condition};
use crate::types::{Batch, Kind, ResourceIdentifier};
use crate::validation::{self, Validate};

/// Write mode of a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
	NoOp,
	FullSync,
	Upsert,
	Delete,
}

impl SyncOp {
	/// Map the wire integer. Unknown values fall back to FullSync for
	/// compatibility with older callers unless strict mode rejects them.
	pub fn from_wire(raw: i32, strict: bool) -> Result<SyncOp, Error> {
		match raw {
			0 => Ok(SyncOp::NoOp),
			1 => Ok(SyncOp::FullSync),
			2 => Ok(SyncOp::Upsert),
			3 => Ok(SyncOp::Delete),
			other if strict => Err(Error::invalid_argument(format!("unknown sync op {other}"))),
			other => {
				warn!(op = other, "unknown sync op, defaulting to FullSync");
				Ok(SyncOp::FullSync)
			},
		}
	}
}

/// The domain facade: validates, writes, reconciles and enqueues downstream
/// deltas, one transaction per request.
pub struct Facade {
	store: Arc<MemStore>,
	sync: Option<SyncHandle>,
	strict_ops: bool,
}

impl Facade {
	pub fn new(store: Arc<MemStore>, sync: Option<SyncHandle>, strict_ops: bool) -> Self {
		Self {
			store,
			sync,
			strict_ops,
		}
	}

	pub fn map_wire_op(&self, raw: i32) -> Result<SyncOp, Error> {
		SyncOp::from_wire(raw, self.strict_ops)
	}

	/// Apply one write request. NoOp succeeds without touching state; the
	/// other ops run validate → write → reconcile → conditions → commit and
	/// then enqueue the committed delta group.
	pub async fn sync(&self, op: SyncOp, subject: Batch) -> Result<(), Error> {
		if op == SyncOp::NoOp {
			return Ok(());
		}
		match subject {
			Batch::Services(items) => self.apply(op, items).await,
			Batch::AddressGroups(items) => self.apply(op, items).await,
			Batch::AddressGroupBindings(items) => self.apply(op, items).await,
			Batch::AddressGroupBindingPolicies(items) => self.apply(op, items).await,
			Batch::AddressGroupPortMappings(items) => self.apply(op, items).await,
			Batch::RulesS2S(items) => self.apply(op, items).await,
			Batch::ServiceAliases(items) => self.apply(op, items).await,
			Batch::IEAgAgRules(items) => self.apply(op, items).await,
			Batch::Networks(items) => self.apply(op, items).await,
			Batch::NetworkBindings(items) => self.apply(op, items).await,
			Batch::Hosts(items) => self.apply(op, items).await,
			Batch::HostBindings(items) => self.apply(op, items).await,
		}
	}

	async fn apply<T: Keyed + Validate>(&self, op: SyncOp, mut items: Vec<T>) -> Result<(), Error> {
		if T::KIND.is_derived() {
			return Err(Error::invalid_argument(format!(
				"{} is derived and cannot be written by callers",
				T::KIND
			)));
		}
		// A delete is addressed by identity alone; only writes carry a full
		// spec worth validating.
		if op != SyncOp::Delete {
			for item in &items {
				item.validate()?;
			}
			let mut seen = BTreeSet::new();
			for item in &items {
				if !seen.insert(item.id()) {
					return Err(Error::already_exists(format!(
						"{} {}: duplicate identity in request",
						T::KIND,
						item.id()
					)));
				}
			}
			for item in items.iter_mut() {
				item.strip_derived();
			}
		}
		// The scope of a FullSync is the namespace set of its batch; with no
		// items there is nothing in scope to replace.
		if op == SyncOp::FullSync && items.is_empty() {
			return Ok(());
		}

		let mut tx = self.store.begin().await;
		// Derived fields belong to the reconciler: the caller's values were
		// stripped above, the stored ones ride along so an unchanged spec is
		// stored byte-identically.
		if op != SyncOp::Delete {
			for item in items.iter_mut() {
				if let Some(prev) = T::table(tx.state()).get(&item.id()).cloned() {
					item.carry_derived(&prev);
				}
			}
		}
		match op {
			SyncOp::NoOp => return Ok(()),
			SyncOp::Upsert => {
				for item in items {
					tx.upsert(item)?;
				}
			},
			SyncOp::Delete => {
				for item in &items {
					tx.delete::<T>(&item.id());
				}
			},
			SyncOp::FullSync => {
				let scope = Scope::namespaces(
					items
						.iter()
						.map(|i| i.self_ref().namespace.clone())
						.collect::<BTreeSet<String>>(),
				);
				tx.sync_kind(items, &scope)?;
			},
		}

		// Validators and the reconciler are a failure domain of their own: a
		// panic aborts the transaction instead of corrupting storage.
		let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), Error> {
			validation::check_referential(tx.state())?;
			reconcile::run(&mut tx)
		}));
		match outcome {
			Ok(Ok(())) => {},
			Ok(Err(err)) => return Err(err),
			Err(_) => {
				return Err(Error::internal(
					"validation or reconciliation panicked; transaction aborted",
				));
			},
		}

		self.mark_conditions(&mut tx);
		let changes = tx.commit();
		debug!(kind = %T::KIND, changes = changes.len(), "sync committed");
		self.enqueue(changes).await;
		Ok(())
	}

	fn mark_conditions(&self, tx: &mut Tx<'_>) {
		let mut last: BTreeMap<(Kind, ResourceIdentifier), ChangeOp> = BTreeMap::new();
		for c in tx.changes() {
			last.insert((c.kind, c.id.clone()), c.op);
		}
		let mut by_kind: BTreeMap<Kind, Vec<ResourceIdentifier>> = BTreeMap::new();
		for ((kind, id), op) in last {
			if op == ChangeOp::Upsert {
				by_kind.entry(kind).or_default().push(id);
			}
		}
		let now = Utc::now();
		let pending_sync = self.sync.is_some();
		for (kind, ids) in by_kind {
			for_each_meta_mut(tx.state_mut(), kind, &ids, &mut |meta| {
				meta.set_condition(
					condition::VALIDATED,
					ConditionStatus::True,
					condition::REASON_VALIDATED,
					"",
					now,
				);
				meta.set_condition(
					condition::READY,
					ConditionStatus::True,
					condition::REASON_RECONCILED,
					"",
					now,
				);
				if pending_sync {
					meta.set_condition(
						condition::SYNCED,
						ConditionStatus::Unknown,
						condition::REASON_PENDING_SYNC,
						"",
						now,
					);
				}
				meta.observed_generation = meta.generation;
			});
		}
	}

	/// Hand the committed change set to the sync worker as one atomic group.
	/// Publish failures never fail the originating write.
	async fn enqueue(&self, changes: Vec<Change>) {
		let Some(sync) = &self.sync else {
			return;
		};
		if changes.is_empty() {
			return;
		}
		let mut by_kind: BTreeMap<Kind, BTreeSet<ResourceIdentifier>> = BTreeMap::new();
		for c in changes {
			by_kind.entry(c.kind).or_default().insert(c.id);
		}
		let group: Vec<Delta> = by_kind
			.into_iter()
			.map(|(kind, ids)| Delta {
				kind,
				ids: ids.into_iter().collect(),
			})
			.collect();
		if let Err(err) = sync.enqueue(group).await {
			warn!(%err, "failed to enqueue sync delta");
		}
	}

	/// Point read from the committed snapshot.
	pub fn get<T: Keyed>(&self, id: &ResourceIdentifier) -> Result<T, Error> {
		T::table(&self.store.snapshot())
			.get(id)
			.cloned()
			.ok_or_else(|| Error::not_found(format!("{} {id}", T::KIND)))
	}

	/// Scoped list over the committed snapshot. Unscoped by default.
	pub fn list<T: Keyed>(&self, scope: &Scope) -> Vec<T> {
		T::table(&self.store.snapshot()).list(scope)
	}

	/// Timestamp of the last successful downstream publish.
	pub fn sync_status(&self) -> Option<DateTime<Utc>> {
		self.store.sync_status()
	}
}
