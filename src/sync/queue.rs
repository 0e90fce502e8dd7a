use std::cmp;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncSettings;
use crate::store::{Keyed, MemStore, State, for_each_meta_mut};
use crate::sync::{Delta, EnforcementClient, EnforcementUpdate, PublishError, SyncHandle};
use crate::types::meta::{ConditionStatus, condition};
use crate::types::{
	AddressGroup, AddressGroupBinding, AddressGroupBindingPolicy, AddressGroupPortMapping, Batch,
	Host, HostBinding, IEAgAgRule, Kind, Network, NetworkBinding, ResourceIdentifier, RuleS2S,
	Service, ServiceAlias,
};

// Upper bound on the select sleep when nothing is pending.
const IDLE: Duration = Duration::from_secs(60);

/// Start the single-consumer sync worker. The returned handle is the bounded
/// producer side; the worker runs until the token fires or all producers are
/// dropped, flushing pending batches within the configured grace period.
pub fn spawn(
	cfg: SyncSettings,
	store: Arc<MemStore>,
	client: Arc<dyn EnforcementClient>,
	shutdown: CancellationToken,
) -> (SyncHandle, JoinHandle<()>) {
	let (tx, rx) = mpsc::channel(cfg.queue_capacity);
	let worker = Worker {
		cfg,
		store,
		client,
		rx,
		pending: BTreeMap::new(),
	};
	let handle = tokio::spawn(worker.run(shutdown));
	(SyncHandle { tx }, handle)
}

/// One coalescing slot per kind: identities accumulated while the debounce
/// timer keeps getting pushed back by new arrivals.
struct Pending {
	ids: BTreeSet<ResourceIdentifier>,
	deadline: Instant,
	attempt: u32,
	enqueued_at: Instant,
}

enum Event {
	Group(Option<Vec<Delta>>),
	Fire,
	Cleanup,
	Shutdown,
}

struct Worker {
	cfg: SyncSettings,
	store: Arc<MemStore>,
	client: Arc<dyn EnforcementClient>,
	rx: mpsc::Receiver<Vec<Delta>>,
	pending: BTreeMap<Kind, Pending>,
}

impl Worker {
	async fn run(mut self, shutdown: CancellationToken) {
		let mut cleanup = tokio::time::interval(self.cfg.cleanup_interval);
		cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			let next = self.pending.values().map(|p| p.deadline).min();
			let sleep_to = next.unwrap_or_else(|| Instant::now() + IDLE);
			let event = tokio::select! {
				group = self.rx.recv() => Event::Group(group),
				_ = tokio::time::sleep_until(sleep_to), if next.is_some() => Event::Fire,
				_ = cleanup.tick() => Event::Cleanup,
				_ = shutdown.cancelled() => Event::Shutdown,
			};
			match event {
				Event::Group(Some(group)) => self.absorb(group),
				Event::Group(None) | Event::Shutdown => break,
				Event::Fire => self.fire().await,
				Event::Cleanup => self.purge_stale().await,
			}
		}
		self.flush().await;
	}

	fn absorb(&mut self, group: Vec<Delta>) {
		let now = Instant::now();
		let debounce = self.cfg.debounce;
		for delta in group {
			debug!(kind = %delta.kind, ids = delta.ids.len(), "delta enqueued");
			let entry = self.pending.entry(delta.kind).or_insert_with(|| Pending {
				ids: BTreeSet::new(),
				deadline: now + debounce,
				attempt: 0,
				enqueued_at: now,
			});
			entry.ids.extend(delta.ids);
			// The debounce window restarts on every arrival until it elapses
			// without one.
			entry.deadline = now + debounce;
		}
	}

	async fn fire(&mut self) {
		let now = Instant::now();
		let due: Vec<Kind> = self
			.pending
			.iter()
			.filter(|(_, p)| p.deadline <= now)
			.map(|(k, _)| *k)
			.collect();
		for kind in due {
			self.attempt(kind).await;
		}
	}

	/// One publish attempt for a kind's pending slot. The snapshot is taken
	/// at attempt time, so coalesced identities always ship in their latest
	/// committed shape.
	async fn attempt(&mut self, kind: Kind) {
		let Some(entry) = self.pending.get(&kind) else {
			return;
		};
		let ids: Vec<ResourceIdentifier> = entry.ids.iter().cloned().collect();
		let attempt = entry.attempt + 1;
		let snapshot = self.store.snapshot();
		let update = collect_update(&snapshot, kind, &ids);

		match self.client.publish(&update).await {
			Ok(()) => {
				info!(kind = %kind, ids = ids.len(), attempt, "published");
				self.store.set_sync_status(Utc::now());
				self
					.mark_synced(kind, &ids, ConditionStatus::True, condition::REASON_SYNCED, "")
					.await;
				self.pending.remove(&kind);
			},
			Err(PublishError::Permanent(err)) => {
				warn!(kind = %kind, attempt, %err, "permanent publish failure");
				self
					.mark_synced(
						kind,
						&ids,
						ConditionStatus::False,
						condition::REASON_SYNC_FAILED,
						&err,
					)
					.await;
				self.pending.remove(&kind);
			},
			Err(PublishError::Transient(err)) => {
				if attempt > self.cfg.retry.max_retries {
					warn!(kind = %kind, attempt, %err, "retries exhausted");
					self
						.mark_synced(
							kind,
							&ids,
							ConditionStatus::False,
							condition::REASON_SYNC_FAILED,
							&format!("retries exhausted: {err}"),
						)
						.await;
					self.pending.remove(&kind);
				} else {
					let delay = self.backoff(attempt);
					warn!(kind = %kind, attempt, %err, ?delay, "publish failed, retrying");
					if let Some(entry) = self.pending.get_mut(&kind) {
						entry.attempt = attempt;
						entry.deadline = Instant::now() + delay;
					}
				}
			},
		}
	}

	fn backoff(&self, attempt: u32) -> Duration {
		let exp = self
			.cfg
			.retry
			.backoff_factor
			.powi(attempt.saturating_sub(1) as i32);
		cmp::min(
			self.cfg.retry.initial_delay.mul_f64(exp),
			self.cfg.retry.max_delay,
		)
	}

	/// Drop entries that have been pending longer than the configured max
	/// age, bounding memory when the backend stays down.
	async fn purge_stale(&mut self) {
		let now = Instant::now();
		let stale: Vec<Kind> = self
			.pending
			.iter()
			.filter(|(_, p)| now.duration_since(p.enqueued_at) > self.cfg.max_age)
			.map(|(k, _)| *k)
			.collect();
		for kind in stale {
			if let Some(entry) = self.pending.remove(&kind) {
				let ids: Vec<ResourceIdentifier> = entry.ids.into_iter().collect();
				warn!(kind = %kind, ids = ids.len(), "purging over-age sync entry");
				self
					.mark_synced(
						kind,
						&ids,
						ConditionStatus::False,
						condition::REASON_SYNC_FAILED,
						"sync entry exceeded max age",
					)
					.await;
			}
		}
	}

	/// Final pass at shutdown: one attempt per pending kind inside the grace
	/// period, then abandon whatever is left.
	async fn flush(&mut self) {
		if self.pending.is_empty() {
			return;
		}
		let grace = self.cfg.shutdown_grace;
		let kinds: Vec<Kind> = self.pending.keys().copied().collect();
		let flush_all = async {
			for kind in kinds {
				self.attempt(kind).await;
			}
		};
		if tokio::time::timeout(grace, flush_all).await.is_err() {
			warn!("shutdown grace period elapsed with sync entries pending");
		}
	}

	async fn mark_synced(
		&self,
		kind: Kind,
		ids: &[ResourceIdentifier],
		status: ConditionStatus,
		reason: &str,
		message: &str,
	) {
		let mut tx = self.store.begin().await;
		let now = Utc::now();
		for_each_meta_mut(tx.state_mut(), kind, ids, &mut |meta| {
			meta.set_condition(condition::SYNCED, status, reason, message, now);
			meta.resource_version += 1;
		});
		tx.commit();
	}
}

fn collect_update(state: &State, kind: Kind, ids: &[ResourceIdentifier]) -> EnforcementUpdate {
	fn split<T: Keyed>(state: &State, ids: &[ResourceIdentifier]) -> (Vec<T>, Vec<ResourceIdentifier>) {
		let mut items = Vec::new();
		let mut removed = Vec::new();
		for id in ids {
			match T::table(state).get(id) {
				Some(item) => items.push(item.clone()),
				None => removed.push(id.clone()),
			}
		}
		(items, removed)
	}

	match kind {
		Kind::Service => {
			let (items, removed) = split::<Service>(state, ids);
			EnforcementUpdate {
				subject: Batch::Services(items),
				removed,
			}
		},
		Kind::AddressGroup => {
			let (items, removed) = split::<AddressGroup>(state, ids);
			EnforcementUpdate {
				subject: Batch::AddressGroups(items),
				removed,
			}
		},
		Kind::AddressGroupBinding => {
			let (items, removed) = split::<AddressGroupBinding>(state, ids);
			EnforcementUpdate {
				subject: Batch::AddressGroupBindings(items),
				removed,
			}
		},
		Kind::AddressGroupBindingPolicy => {
			let (items, removed) = split::<AddressGroupBindingPolicy>(state, ids);
			EnforcementUpdate {
				subject: Batch::AddressGroupBindingPolicies(items),
				removed,
			}
		},
		Kind::AddressGroupPortMapping => {
			let (items, removed) = split::<AddressGroupPortMapping>(state, ids);
			EnforcementUpdate {
				subject: Batch::AddressGroupPortMappings(items),
				removed,
			}
		},
		Kind::RuleS2S => {
			let (items, removed) = split::<RuleS2S>(state, ids);
			EnforcementUpdate {
				subject: Batch::RulesS2S(items),
				removed,
			}
		},
		Kind::ServiceAlias => {
			let (items, removed) = split::<ServiceAlias>(state, ids);
			EnforcementUpdate {
				subject: Batch::ServiceAliases(items),
				removed,
			}
		},
		Kind::IEAgAgRule => {
			let (items, removed) = split::<IEAgAgRule>(state, ids);
			EnforcementUpdate {
				subject: Batch::IEAgAgRules(items),
				removed,
			}
		},
		Kind::Network => {
			let (items, removed) = split::<Network>(state, ids);
			EnforcementUpdate {
				subject: Batch::Networks(items),
				removed,
			}
		},
		Kind::NetworkBinding => {
			let (items, removed) = split::<NetworkBinding>(state, ids);
			EnforcementUpdate {
				subject: Batch::NetworkBindings(items),
				removed,
			}
		},
		Kind::Host => {
			let (items, removed) = split::<Host>(state, ids);
			EnforcementUpdate {
				subject: Batch::Hosts(items),
				removed,
			}
		},
		Kind::HostBinding => {
			let (items, removed) = split::<HostBinding>(state, ids);
			EnforcementUpdate {
				subject: Batch::HostBindings(items),
				removed,
			}
		},
	}
}
