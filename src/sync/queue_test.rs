use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{RetrySettings, SyncSettings};
use crate::store::MemStore;
use crate::sync::{
	Delta, EnforcementClient, EnforcementUpdate, PublishError, spawn,
};
use crate::types::meta::{ConditionStatus, condition};
use crate::types::*;

/// Client whose outcomes are scripted per publish; unscripted calls succeed.
#[derive(Default)]
struct ScriptedClient {
	script: Mutex<VecDeque<Result<(), PublishError>>>,
	published: Mutex<Vec<EnforcementUpdate>>,
}

impl ScriptedClient {
	fn with_script(script: Vec<Result<(), PublishError>>) -> Arc<Self> {
		Arc::new(Self {
			script: Mutex::new(script.into()),
			published: Mutex::new(Vec::new()),
		})
	}

	fn published(&self) -> Vec<EnforcementUpdate> {
		self.published.lock().unwrap().clone()
	}
}

#[async_trait]
impl EnforcementClient for ScriptedClient {
	async fn publish(&self, update: &EnforcementUpdate) -> Result<(), PublishError> {
		self.published.lock().unwrap().push(update.clone());
		self
			.script
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or(Ok(()))
	}
}

fn settings() -> SyncSettings {
	SyncSettings {
		enabled: true,
		debounce: Duration::from_secs(5),
		cleanup_interval: Duration::from_secs(600),
		max_age: Duration::from_secs(3600),
		queue_capacity: 16,
		shutdown_grace: Duration::from_secs(10),
		retry: RetrySettings {
			initial_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
			backoff_factor: 2.0,
			max_retries: 2,
		},
	}
}

async fn seed_service(store: &MemStore, name: &str) -> ResourceIdentifier {
	let id = ResourceIdentifier::new("default", name);
	let mut tx = store.begin().await;
	tx.upsert(Service {
		self_ref: id.clone(),
		..Default::default()
	})
	.unwrap();
	tx.commit();
	id
}

async fn settle() {
	for _ in 0..50 {
		tokio::task::yield_now().await;
	}
}

async fn advance(d: Duration) {
	tokio::time::advance(d).await;
	settle().await;
}

#[tokio::test(start_paused = true)]
async fn deltas_coalesce_within_the_debounce_window() {
	let store = Arc::new(MemStore::new());
	let a = seed_service(&store, "a").await;
	let b = seed_service(&store, "b").await;
	let client = ScriptedClient::with_script(vec![]);
	let token = CancellationToken::new();
	let (handle, _worker) = spawn(settings(), store.clone(), client.clone(), token);

	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![a.clone()],
		}])
		.await
		.unwrap();
	settle().await;
	advance(Duration::from_secs(2)).await;
	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![b.clone()],
		}])
		.await
		.unwrap();
	settle().await;

	// Window restarted at the second delta: 4s in, nothing published yet.
	advance(Duration::from_secs(4)).await;
	assert!(client.published().is_empty());

	advance(Duration::from_secs(2)).await;
	let published = client.published();
	assert_eq!(published.len(), 1, "coalesced into one publish");
	assert_eq!(published[0].subject.kind(), Kind::Service);
	assert_eq!(published[0].subject.len(), 2);
	assert!(published[0].removed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn publish_success_sets_status_and_conditions() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	let client = ScriptedClient::with_script(vec![]);
	let token = CancellationToken::new();
	let (handle, _worker) = spawn(settings(), store.clone(), client.clone(), token);

	assert!(store.sync_status().is_none());
	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![id.clone()],
		}])
		.await
		.unwrap();
	settle().await;
	advance(Duration::from_secs(6)).await;

	assert_eq!(client.published().len(), 1);
	assert!(store.sync_status().is_some());
	let snap = store.snapshot();
	let svc = snap.services.get(&id).unwrap();
	let synced = svc.meta.condition(condition::SYNCED).unwrap();
	assert_eq!(synced.status, ConditionStatus::True);
	assert_eq!(synced.reason, condition::REASON_SYNCED);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_backoff_until_success() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	let client = ScriptedClient::with_script(vec![
		Err(PublishError::Transient("down".to_string())),
		Err(PublishError::Transient("still down".to_string())),
		Ok(()),
	]);
	let token = CancellationToken::new();
	let (handle, _worker) = spawn(settings(), store.clone(), client.clone(), token);

	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![id.clone()],
		}])
		.await
		.unwrap();
	settle().await;

	// Debounce elapses: first attempt fails.
	advance(Duration::from_secs(5)).await;
	assert_eq!(client.published().len(), 1);
	// First retry after the initial delay.
	advance(Duration::from_secs(1)).await;
	assert_eq!(client.published().len(), 2);
	// Second retry after doubled delay; this one succeeds.
	advance(Duration::from_secs(2)).await;
	assert_eq!(client.published().len(), 3);

	assert!(store.sync_status().is_some());
	let snap = store.snapshot();
	let synced = snap.services.get(&id).unwrap().meta.condition(condition::SYNCED);
	assert_eq!(synced.unwrap().status, ConditionStatus::True);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_mark_synced_false() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	let client = ScriptedClient::with_script(vec![
		Err(PublishError::Transient("down".to_string())),
		Err(PublishError::Transient("down".to_string())),
		Err(PublishError::Transient("down".to_string())),
	]);
	let token = CancellationToken::new();
	let mut cfg = settings();
	cfg.retry.max_retries = 1;
	let (handle, _worker) = spawn(cfg, store.clone(), client.clone(), token);

	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![id.clone()],
		}])
		.await
		.unwrap();
	settle().await;
	advance(Duration::from_secs(5)).await;
	advance(Duration::from_secs(1)).await;
	assert_eq!(client.published().len(), 2);

	// Entry is gone; time passing produces no more attempts.
	advance(Duration::from_secs(120)).await;
	assert_eq!(client.published().len(), 2);

	assert!(store.sync_status().is_none());
	let snap = store.snapshot();
	let synced = snap.services.get(&id).unwrap().meta.condition(condition::SYNCED);
	let synced = synced.unwrap();
	assert_eq!(synced.status, ConditionStatus::False);
	assert_eq!(synced.reason, condition::REASON_SYNC_FAILED);
}

#[tokio::test(start_paused = true)]
async fn permanent_failures_do_not_retry() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	let client = ScriptedClient::with_script(vec![Err(PublishError::Permanent(
		"schema mismatch".to_string(),
	))]);
	let token = CancellationToken::new();
	let (handle, _worker) = spawn(settings(), store.clone(), client.clone(), token);

	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![id.clone()],
		}])
		.await
		.unwrap();
	settle().await;
	advance(Duration::from_secs(6)).await;
	advance(Duration::from_secs(120)).await;
	assert_eq!(client.published().len(), 1);

	let snap = store.snapshot();
	let synced = snap.services.get(&id).unwrap().meta.condition(condition::SYNCED);
	assert_eq!(synced.unwrap().status, ConditionStatus::False);
}

#[tokio::test(start_paused = true)]
async fn deleted_identities_ship_as_removals() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	let mut tx = store.begin().await;
	tx.delete::<Service>(&id);
	tx.commit();

	let client = ScriptedClient::with_script(vec![]);
	let token = CancellationToken::new();
	let (handle, _worker) = spawn(settings(), store.clone(), client.clone(), token);
	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![id.clone()],
		}])
		.await
		.unwrap();
	settle().await;
	advance(Duration::from_secs(6)).await;

	let published = client.published();
	assert_eq!(published.len(), 1);
	assert!(published[0].subject.is_empty());
	assert_eq!(published[0].removed, vec![id]);
}

#[tokio::test(start_paused = true)]
async fn kinds_debounce_independently() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	let client = ScriptedClient::with_script(vec![]);
	let token = CancellationToken::new();
	let (handle, _worker) = spawn(settings(), store.clone(), client.clone(), token);

	handle
		.enqueue(vec![
			Delta {
				kind: Kind::Service,
				ids: vec![id.clone()],
			},
			Delta {
				kind: Kind::AddressGroup,
				ids: vec![ResourceIdentifier::new("default", "ghost")],
			},
		])
		.await
		.unwrap();
	settle().await;
	advance(Duration::from_secs(6)).await;

	let kinds: Vec<Kind> = client.published().iter().map(|u| u.subject.kind()).collect();
	assert_eq!(kinds.len(), 2);
	assert!(kinds.contains(&Kind::Service));
	assert!(kinds.contains(&Kind::AddressGroup));
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_pending_batches() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	let client = ScriptedClient::with_script(vec![]);
	let token = CancellationToken::new();
	let (handle, worker) = spawn(settings(), store.clone(), client.clone(), token.clone());

	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![id],
		}])
		.await
		.unwrap();
	settle().await;
	assert!(client.published().is_empty());

	// Cancel inside the debounce window: the pending batch still ships.
	token.cancel();
	worker.await.unwrap();
	assert_eq!(client.published().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn over_age_entries_are_purged_by_cleanup() {
	let store = Arc::new(MemStore::new());
	let id = seed_service(&store, "a").await;
	// Always failing, with enough retries allowed that only the age cap can
	// end the entry.
	let client = ScriptedClient::with_script(
		std::iter::repeat_with(|| Err(PublishError::Transient("down".to_string())))
			.take(64)
			.collect(),
	);
	let token = CancellationToken::new();
	let mut cfg = settings();
	cfg.max_age = Duration::from_secs(30);
	cfg.cleanup_interval = Duration::from_secs(60);
	cfg.retry.max_retries = 1000;
	cfg.retry.max_delay = Duration::from_secs(5);
	let (handle, _worker) = spawn(cfg, store.clone(), client.clone(), token);

	handle
		.enqueue(vec![Delta {
			kind: Kind::Service,
			ids: vec![id.clone()],
		}])
		.await
		.unwrap();
	settle().await;
	for _ in 0..14 {
		advance(Duration::from_secs(5)).await;
	}

	let snap = store.snapshot();
	let synced = snap.services.get(&id).unwrap().meta.condition(condition::SYNCED);
	let synced = synced.unwrap();
	assert_eq!(synced.status, ConditionStatus::False);
	assert!(synced.message.contains("max age"));

	// Purged: no further attempts.
	let count = client.published().len();
	advance(Duration::from_secs(60)).await;
	assert_eq!(client.published().len(), count);
}
